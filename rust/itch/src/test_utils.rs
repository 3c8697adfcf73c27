//! Builders for messages used across unit tests.
use crate::{
    enums::{
        Authenticity, Coded, FinancialStatus, Indicator, LuldTier, MarketCategory, Side,
        SystemEventCode, TradingState, YesNo,
    },
    message::*,
    Alpha, Price4, Stock,
};

/// The stock locate code used by default.
pub const LOCATE: u16 = 1;
/// The timestamp used by default.
pub const TS: u64 = 100;

pub fn hd() -> MessageHeader {
    MessageHeader::new(LOCATE, 0, TS)
}

pub fn stock(symbol: &str) -> Stock {
    symbol.parse().unwrap()
}

/// Sets the timestamp of `msg`.
pub fn at(mut msg: Message, ts: u64) -> Message {
    msg.header_mut().timestamp = ts;
    msg
}

/// Sets the stock locate code of `msg`.
pub fn on(mut msg: Message, locate: u16) -> Message {
    msg.header_mut().stock_locate = locate;
    msg
}

pub fn add_order(order_ref: u64, side: Side, shares: u32, symbol: &str, price: u32) -> Message {
    Message::AddOrder(AddOrderMsg {
        hd: hd(),
        order_ref,
        side: Coded::Known(side),
        shares,
        stock: stock(symbol),
        price: Price4(price),
    })
}

pub fn add_order_mpid(
    order_ref: u64,
    side: Side,
    shares: u32,
    symbol: &str,
    price: u32,
    mpid: &str,
) -> Message {
    Message::AddOrderMpid(AddOrderMpidMsg {
        hd: hd(),
        order_ref,
        side: Coded::Known(side),
        shares,
        stock: stock(symbol),
        price: Price4(price),
        attribution: mpid.parse().unwrap(),
    })
}

pub fn executed(order_ref: u64, executed_shares: u32) -> Message {
    Message::OrderExecuted(OrderExecutedMsg {
        hd: hd(),
        order_ref,
        executed_shares,
        match_number: order_ref + 1_000,
    })
}

pub fn executed_with_price(
    order_ref: u64,
    executed_shares: u32,
    price: u32,
    printable: bool,
) -> Message {
    Message::OrderExecutedWithPrice(OrderExecutedWithPriceMsg {
        hd: hd(),
        order_ref,
        executed_shares,
        match_number: order_ref + 1_000,
        printable: Coded::Known(if printable { YesNo::Yes } else { YesNo::No }),
        execution_price: Price4(price),
    })
}

pub fn cancel(order_ref: u64, cancelled_shares: u32) -> Message {
    Message::OrderCancel(OrderCancelMsg {
        hd: hd(),
        order_ref,
        cancelled_shares,
    })
}

pub fn delete(order_ref: u64) -> Message {
    Message::OrderDelete(OrderDeleteMsg { hd: hd(), order_ref })
}

pub fn replace(original_order_ref: u64, new_order_ref: u64, shares: u32, price: u32) -> Message {
    Message::OrderReplace(OrderReplaceMsg {
        hd: hd(),
        original_order_ref,
        new_order_ref,
        shares,
        price: Price4(price),
    })
}

pub fn trade(side: Side, shares: u32, symbol: &str, price: u32) -> Message {
    Message::Trade(TradeMsg {
        hd: hd(),
        order_ref: 0,
        side: Coded::Known(side),
        shares,
        stock: stock(symbol),
        price: Price4(price),
        match_number: 1,
    })
}

pub fn system_event(event: SystemEventCode) -> Message {
    Message::SystemEvent(SystemEventMsg {
        hd: MessageHeader::new(0, 0, TS),
        event_code: Coded::Known(event),
    })
}

pub fn stock_directory(locate: u16, symbol: &str) -> Message {
    Message::StockDirectory(StockDirectoryMsg {
        hd: MessageHeader::new(locate, 0, TS),
        stock: stock(symbol),
        market_category: Coded::Known(MarketCategory::NasdaqGlobalSelect),
        financial_status: Coded::Known(FinancialStatus::Normal),
        round_lot_size: 100,
        round_lots_only: Coded::Known(YesNo::No),
        issue_classification: "C".parse::<Alpha<1>>().unwrap(),
        issue_sub_type: "Z".parse::<Alpha<2>>().unwrap(),
        authenticity: Coded::Known(Authenticity::Production),
        short_sale_threshold: Coded::Known(Indicator::No),
        ipo_flag: Coded::Known(Indicator::No),
        luld_reference_price_tier: Coded::Known(LuldTier::Tier1),
        etp_flag: Coded::Known(Indicator::No),
        etp_leverage_factor: 0,
        inverse_indicator: Coded::Known(YesNo::No),
    })
}

pub fn trading_action(locate: u16, symbol: &str, state: TradingState) -> Message {
    Message::StockTradingAction(StockTradingActionMsg {
        hd: MessageHeader::new(locate, 0, TS),
        stock: stock(symbol),
        trading_state: Coded::Known(state),
        reserved: Alpha::default(),
        reason: Alpha::default(),
    })
}
