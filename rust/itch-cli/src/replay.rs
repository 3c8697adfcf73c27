use std::{
    io::{self, Write},
    ops::ControlFlow,
};

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use itch::{
    decode::DecodeMessage, pretty::Ts, DepthLevel, DepthSnapshot, Replayer, Session, Side,
};

use crate::{output_from_args, Args};

/// Replays `decoder` as directed by `args` and writes either the depth of the
/// requested symbol or the replay summary.
pub fn replay<D: DecodeMessage>(decoder: D, args: &Args) -> anyhow::Result<()> {
    let mut replayer = Replayer::with_decoder(decoder, args.session_config());
    let limit = args.limit.map(u64::from);
    let mut count = 0;
    let res = replayer.run_to_end(|step| {
        count += 1;
        let past_at = args.at.is_some_and(|at| step.message.timestamp() > at);
        if past_at || limit.is_some_and(|limit| count >= limit) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    if let Err(error) = res {
        warn!(
            messages = count,
            offset = replayer.offset(),
            %error,
            "Replay halted"
        );
        // still summarize what was replayed up to the halt
        if args.symbol.is_none() {
            write_summary(replayer.session(), args)?;
        }
        return Err(error).context("Replay stopped");
    }
    if replayer.is_finished() {
        info!(messages = count, "Replayed to the end of the stream");
    } else {
        info!(
            messages = count,
            offset = replayer.offset(),
            "Stopped replay before the end of the stream"
        );
    }
    let session = replayer.session();
    match &args.symbol {
        Some(symbol) => {
            let at = args.at.unwrap_or(session.clock());
            let mut snapshot = session
                .snapshot(symbol, at)
                .with_context(|| format!("Unable to output depth of '{symbol}'"))?;
            if let Some(depth) = args.depth {
                snapshot.truncate(depth);
            }
            write_depth(&snapshot, args)
        }
        None => write_summary(session, args),
    }
}

#[derive(Debug, Serialize)]
struct DepthRow<'a> {
    symbol: &'a str,
    ts: String,
    side: char,
    level: usize,
    price: String,
    shares: u64,
    orders: u32,
}

fn write_depth(snapshot: &DepthSnapshot, args: &Args) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(output_from_args(args)?);
    let ts = Ts(snapshot.timestamp).to_string();
    for side in [Side::Buy, Side::Sell] {
        for (i, DepthLevel { price, shares, orders }) in snapshot.levels(side).iter().enumerate()
        {
            writer.serialize(DepthRow {
                symbol: snapshot.symbol.as_str(),
                ts: ts.clone(),
                side: char::from(side),
                level: i,
                price: price.to_string(),
                shares: *shares,
                orders: *orders,
            })?;
        }
    }
    // an empty book still gets a header
    if snapshot.is_empty() {
        writer.write_record(["symbol", "ts", "side", "level", "price", "shares", "orders"])?;
    }
    handle_broken_pipe(writer.flush())
}

fn write_summary(session: &Session, args: &Args) -> anyhow::Result<()> {
    let mut writer = output_from_args(args)?;
    let stats = session.stats();
    let mut write = || -> io::Result<()> {
        writeln!(writer, "messages: {}", stats.messages)?;
        for (tag, count) in stats.by_type.iter() {
            writeln!(writer, "  {tag}: {count}")?;
        }
        writeln!(writer, "anomalies: {}", stats.total_anomalies())?;
        for (kind, count) in stats.anomalies.iter() {
            writeln!(writer, "  {kind}: {count}")?;
        }
        writeln!(writer, "instruments: {}", session.instruments().count())?;
        writeln!(
            writer,
            "resting orders: {}",
            session.books().map(|book| book.order_count()).sum::<usize>()
        )?;
        writeln!(writer, "last timestamp: {}", Ts(session.clock()))?;
        writer.flush()
    };
    handle_broken_pipe(write())
}

fn handle_broken_pipe(res: io::Result<()>) -> anyhow::Result<()> {
    match res {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        res => Ok(res?),
    }
}
