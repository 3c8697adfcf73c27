use std::{fs, path::Path};

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use itch::{
    message::{AddOrderMsg, OrderDeleteMsg, OrderExecutedMsg},
    Coded, EncodeMessage, Framing, Message, MessageEncoder, MessageHeader, Price4, Side,
};
use predicates::{
    boolean::PredicateBooleanExt,
    str::{contains, is_empty, starts_with},
};
use rstest::*;
use tempfile::{tempdir, NamedTempFile, TempDir};

fn cmd() -> Command {
    cargo_bin_cmd!("itch")
}

const AAPL: u16 = 13;
const MSFT: u16 = 42;

fn hd(stock_locate: u16, timestamp: u64) -> MessageHeader {
    MessageHeader::new(stock_locate, 0, timestamp)
}

fn add(locate: u16, ts: u64, order_ref: u64, side: Side, shares: u32, price: u32) -> Message {
    let symbol = if locate == AAPL { "AAPL" } else { "MSFT" };
    Message::AddOrder(AddOrderMsg {
        hd: hd(locate, ts),
        order_ref,
        side: Coded::Known(side),
        shares,
        stock: symbol.parse().unwrap(),
        price: Price4(price),
    })
}

fn executed(locate: u16, ts: u64, order_ref: u64, shares: u32) -> Message {
    Message::OrderExecuted(OrderExecutedMsg {
        hd: hd(locate, ts),
        order_ref,
        executed_shares: shares,
        match_number: order_ref,
    })
}

fn delete(locate: u16, ts: u64, order_ref: u64) -> Message {
    Message::OrderDelete(OrderDeleteMsg {
        hd: hd(locate, ts),
        order_ref,
    })
}

/// 09:30:00 and a few seconds after.
const OPEN: u64 = 34_200_000_000_000;
const SEC: u64 = 1_000_000_000;

fn session_messages() -> Vec<Message> {
    vec![
        add(AAPL, OPEN, 1, Side::Buy, 100, 1_500_000),
        add(AAPL, OPEN + SEC, 2, Side::Buy, 50, 1_500_000),
        add(AAPL, OPEN + 2 * SEC, 3, Side::Sell, 200, 1_501_000),
        add(MSFT, OPEN + 2 * SEC, 4, Side::Sell, 10, 3_000_000),
        executed(AAPL, OPEN + 3 * SEC, 1, 150),
        delete(AAPL, OPEN + 4 * SEC, 3),
        add(AAPL, OPEN + 5 * SEC, 5, Side::Buy, 25, 1_499_900),
    ]
}

fn write_fixture(dir: &Path, framing: Framing, msgs: &[Message]) -> String {
    let path = dir.join("session.itch");
    let mut encoder = MessageEncoder::new(Vec::new(), framing);
    encoder.encode_messages(msgs).unwrap();
    fs::write(&path, encoder.into_inner()).unwrap();
    path.to_str().unwrap().to_owned()
}

#[fixture]
fn dir() -> TempDir {
    tempdir().unwrap()
}

#[rstest]
fn summary_to_stdout(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    cmd()
        .arg(&input)
        .assert()
        .success()
        .stdout(
            starts_with("messages: 7\n")
                .and(contains("  A: 5\n"))
                .and(contains("  E: 1\n"))
                .and(contains("anomalies: 1\n"))
                .and(contains("  quantity_underflow: 1\n"))
                .and(contains("instruments: 2\n"))
                .and(contains("resting orders: 3\n"))
                .and(contains("last timestamp: 09:30:05.000000000")),
        );
}

#[rstest]
fn raw_framing(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::Raw, &session_messages());
    cmd()
        .args([&input, "--framing", "raw"])
        .assert()
        .success()
        .stdout(starts_with("messages: 7\n"));
    // misread as length-prefixed
    cmd()
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("Replay stopped"));
}

#[rstest]
fn depth_at_end(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    cmd()
        .args([&input, "--symbol", "AAPL"])
        .assert()
        .success()
        .stdout(
            "symbol,ts,side,level,price,shares,orders\n\
             AAPL,09:30:05.000000000,B,0,150.0000,50,1\n\
             AAPL,09:30:05.000000000,B,1,149.9900,25,1\n",
        );
}

#[rstest]
fn depth_at_time(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    cmd()
        .args([&input, "--symbol", "AAPL", "--at", "09:30:02.5"])
        .assert()
        .success()
        .stdout(
            "symbol,ts,side,level,price,shares,orders\n\
             AAPL,09:30:02.500000000,B,0,150.0000,150,2\n\
             AAPL,09:30:02.500000000,S,0,150.1000,200,1\n",
        );
}

#[rstest]
fn depth_limited_to_levels(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    let output = dir.path().join("depth.csv");
    cmd()
        .args([
            &input,
            "--symbol",
            "AAPL",
            "--depth",
            "1",
            "--output",
            output.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(is_empty());
    let contents = fs::read_to_string(output).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("B,0,150.0000,50,1"));
}

#[rstest]
fn limit_stops_early(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    cmd()
        .args([&input, "--limit", "2"])
        .assert()
        .success()
        .stdout(starts_with("messages: 2\n").and(contains("resting orders: 2\n")));
}

#[rstest]
fn verbose_logs_early_stop(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    cmd()
        .args([&input, "--limit", "2", "-v"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(contains("Stopped replay before the end of the stream"));
    // warn by default
    cmd()
        .args([&input, "--limit", "2"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(is_empty());
}

#[rstest]
fn unknown_symbol(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    cmd()
        .args([&input, "--symbol", "TSLA"])
        .assert()
        .failure()
        .stderr(contains("unknown instrument 'TSLA'"));
}

#[rstest]
fn skip_unknown(dir: TempDir) {
    let msgs = session_messages();
    let mut encoder = MessageEncoder::new(Vec::new(), Framing::LengthPrefixed);
    encoder.encode_messages(&msgs[..2]).unwrap();
    let mut buf = encoder.into_inner();
    buf.extend([0, 4, b'z', 1, 2, 3]);
    let mut encoder = MessageEncoder::new(buf, Framing::LengthPrefixed);
    encoder.encode_messages(&msgs[2..]).unwrap();
    let input = dir.path().join("gap.itch");
    fs::write(&input, encoder.into_inner()).unwrap();
    let input = input.to_str().unwrap();

    cmd()
        .arg(input)
        .assert()
        .failure()
        .stdout(starts_with("messages: 2\n"))
        .stderr(contains("unknown message type 'z'"));
    cmd()
        .args([input, "--skip-unknown"])
        .assert()
        .success()
        .stdout(starts_with("messages: 7\n").and(contains("  unknown_message_type: 1\n")));
}

#[test]
fn read_from_stdin() {
    let mut encoder = MessageEncoder::new(Vec::new(), Framing::LengthPrefixed);
    encoder.encode_messages(&session_messages()).unwrap();
    cmd()
        .arg("-")
        .write_stdin(encoder.into_inner())
        .assert()
        .success()
        .stdout(starts_with("messages: 7\n"));
}

#[test]
fn read_from_nonexistent_path() {
    let input_file = NamedTempFile::new().unwrap();
    let input_path = input_file.path().to_owned();
    // delete input_file and ensure it was cleaned up
    input_file.close().unwrap();
    cmd()
        .arg(input_path.to_str().unwrap())
        .assert()
        .failure()
        .stderr(contains("Unable to open input file"));
}

#[rstest]
fn output_exists_without_force(dir: TempDir) {
    let input = write_fixture(dir.path(), Framing::LengthPrefixed, &session_messages());
    let output = NamedTempFile::new().unwrap();
    let output = output.path().to_str().unwrap();
    cmd()
        .args([&input, "--output", output])
        .assert()
        .failure()
        .stderr(contains("Output file exists"));
    cmd()
        .args([&input, "--output", output, "--force"])
        .assert()
        .success();
    assert!(fs::read_to_string(output).unwrap().starts_with("messages: 7\n"));
}

#[test]
fn help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Usage:").and(contains("--skip-unknown")));
}
