//! Typed ITCH 5.0 messages and the [`Message`] enum over all of them.
use crate::{
    catalog::{FieldSpec, MessageSpec, HEADER_FIELDS},
    codec::{read_uint, write_uint, Field, FieldReader, FieldWriter, Mpid, Price4, Price8, Stock},
    enums::{
        Authenticity, BreachedLevel, Coded, CrossType, FinancialStatus, HaltAction,
        ImbalanceDirection, Indicator, InterestFlag, IpoReleaseQualifier, LuldTier,
        MarketCategory, MarketCode, MarketMakerMode, ParticipantState, PriceVariation,
        RegShoAction, Side, SystemEventCode, TradingState, YesNo,
    },
    Alpha, Error, HEADER_LEN,
};

/// The fields common to every message. Always found at the beginning of a
/// message, directly after the type tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MessageHeader {
    /// The locate code identifying the security. Assigned per trading day in the
    /// stock directory message; `0` for market-wide messages.
    pub stock_locate: u16,
    /// The Nasdaq internal tracking number.
    pub tracking_number: u16,
    /// Nanoseconds since midnight, transmitted as a 6-byte integer.
    pub timestamp: u64,
}

impl MessageHeader {
    /// Creates a new header.
    pub const fn new(stock_locate: u16, tracking_number: u16, timestamp: u64) -> Self {
        Self {
            stock_locate,
            tracking_number,
            timestamp,
        }
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            stock_locate: u16::decode(&buf[1..3]),
            tracking_number: u16::decode(&buf[3..5]),
            timestamp: read_uint(&buf[5..HEADER_LEN]),
        }
    }

    fn encode(&self, tag: u8, buf: &mut [u8]) {
        buf[0] = tag;
        self.stock_locate.encode(&mut buf[1..3]);
        self.tracking_number.encode(&mut buf[3..5]);
        write_uint(self.timestamp, &mut buf[5..HEADER_LEN]);
    }
}

/// Declares the message structs, their [`MessageSpec`]s, the [`Message`] enum and
/// the catalog from a single field list per message type.
macro_rules! itch_messages {
    ($(
        $(#[$meta:meta])*
        $variant:ident($name:ident) = $tag:literal {
            $( $(#[$fmeta:meta])* $field:ident: $ty:ty ),+ $(,)?
        }
    )+) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            #[cfg_attr(feature = "serde", derive(serde::Serialize))]
            pub struct $name {
                /// The common header.
                pub hd: MessageHeader,
                $( $(#[$fmeta])* pub $field: $ty, )+
            }

            impl $name {
                /// The type tag.
                pub const TAG: u8 = $tag;
                /// The wire layout.
                pub const SPEC: MessageSpec = MessageSpec::new($tag, stringify!($variant), &[
                    HEADER_FIELDS[0],
                    HEADER_FIELDS[1],
                    HEADER_FIELDS[2],
                    HEADER_FIELDS[3],
                    $( FieldSpec::new(stringify!($field), <$ty as Field>::KIND), )+
                ]);
                /// The length in bytes, including the type tag.
                pub const LENGTH: usize = Self::SPEC.length;

                fn decode_body(hd: MessageHeader, buf: &[u8]) -> Self {
                    let mut reader = FieldReader::new(buf, HEADER_LEN);
                    Self {
                        hd,
                        $( $field: reader.read(), )+
                    }
                }

                fn encode_body(&self, buf: &mut [u8]) {
                    self.hd.encode($tag, buf);
                    let mut writer = FieldWriter::new(buf, HEADER_LEN);
                    $( writer.write(&self.$field); )+
                }

                fn collect_invalid(&self, out: &mut Vec<Error>) {
                    $(
                        if let Some(byte) = self.$field.invalid_byte() {
                            out.push(Error::InvalidEnumValue {
                                field: stringify!($field),
                                byte,
                            });
                        }
                    )+
                }
            }

            impl From<$name> for Message {
                fn from(msg: $name) -> Self {
                    Message::$variant(msg)
                }
            }
        )+

        /// An owned ITCH message of any type. Matching on it is exhaustive, so a new
        /// message type can't be silently ignored by the decoder or the book engine.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        #[cfg_attr(feature = "serde", serde(tag = "type"))]
        pub enum Message {
            $( $(#[$meta])* $variant($name), )+
        }

        impl Message {
            /// Returns the type tag.
            pub fn tag(&self) -> u8 {
                match self {
                    $( Message::$variant(_) => $tag, )+
                }
            }

            /// Returns the wire layout of this message's type.
            pub fn spec(&self) -> &'static MessageSpec {
                match self {
                    $( Message::$variant(_) => &$name::SPEC, )+
                }
            }

            /// Returns a reference to the common header.
            pub fn header(&self) -> &MessageHeader {
                match self {
                    $( Message::$variant(msg) => &msg.hd, )+
                }
            }

            /// Returns a mutable reference to the common header.
            pub fn header_mut(&mut self) -> &mut MessageHeader {
                match self {
                    $( Message::$variant(msg) => &mut msg.hd, )+
                }
            }

            /// Encodes the message into the start of `buf`, which must be at least
            /// [`spec().length`](MessageSpec::length) bytes long.
            pub fn encode_into(&self, buf: &mut [u8]) {
                match self {
                    $( Message::$variant(msg) => msg.encode_body(buf), )+
                }
            }

            /// Returns an [`Error::InvalidEnumValue`] for every enumerated field whose
            /// byte didn't map to a known code.
            pub fn invalid_fields(&self) -> Vec<Error> {
                let mut res = Vec::new();
                match self {
                    $( Message::$variant(msg) => msg.collect_invalid(&mut res), )+
                }
                res
            }

            /// Decodes the message with `tag` from `buf`, which must be at least as
            /// long as its layout. Returns `None` for an unknown tag.
            pub(crate) fn decode_body(tag: u8, buf: &[u8]) -> Option<Self> {
                let hd = MessageHeader::decode(buf);
                match tag {
                    $( $tag => Some(Message::$variant($name::decode_body(hd, buf))), )+
                    _ => None,
                }
            }
        }

        pub(crate) const CATALOG: &[MessageSpec] = &[ $( $name::SPEC, )+ ];
    };
}

itch_messages! {
    /// A system event, signaling a market or data feed handler event.
    SystemEvent(SystemEventMsg) = b'S' {
        /// The event.
        event_code: Coded<SystemEventCode>,
    }
    /// The stock directory message, sent for each active security at the start of
    /// the day. Assigns the stock locate code.
    StockDirectory(StockDirectoryMsg) = b'R' {
        /// The security symbol.
        stock: Stock,
        /// The listing market or listing market tier.
        market_category: Coded<MarketCategory>,
        /// The financial status for Nasdaq-listed issues.
        financial_status: Coded<FinancialStatus>,
        /// The number of shares in a round lot.
        round_lot_size: u32,
        /// Whether only round lots are accepted.
        round_lots_only: Coded<YesNo>,
        /// The security class.
        issue_classification: Alpha<1>,
        /// The security sub-type.
        issue_sub_type: Alpha<2>,
        /// Whether the security is live or a test security.
        authenticity: Coded<Authenticity>,
        /// Whether the security is restricted under Reg SHO Rule 203(b)(3).
        short_sale_threshold: Coded<Indicator>,
        /// Whether the security is a new IPO.
        ipo_flag: Coded<Indicator>,
        /// The Limit Up-Limit Down price band tier.
        luld_reference_price_tier: Coded<LuldTier>,
        /// Whether the security is an exchange traded product.
        etp_flag: Coded<Indicator>,
        /// The tracking ratio of an ETP with respect to its underlying index.
        etp_leverage_factor: u32,
        /// Whether the ETP is an inverse ETP.
        inverse_indicator: Coded<YesNo>,
    }
    /// A change in the trading state of a security.
    StockTradingAction(StockTradingActionMsg) = b'H' {
        /// The security symbol.
        stock: Stock,
        /// The current trading state.
        trading_state: Coded<TradingState>,
        /// Reserved.
        reserved: Alpha<1>,
        /// The trading action reason.
        reason: Alpha<4>,
    }
    /// A Reg SHO short sale price test restriction update.
    RegShoRestriction(RegShoRestrictionMsg) = b'Y' {
        /// The security symbol.
        stock: Stock,
        /// The restriction status.
        reg_sho_action: Coded<RegShoAction>,
    }
    /// The status of a market participant in a security.
    MarketParticipantPosition(MarketParticipantPositionMsg) = b'L' {
        /// The market participant identifier.
        mpid: Mpid,
        /// The security symbol.
        stock: Stock,
        /// Whether the participant is the primary market maker.
        primary_market_maker: Coded<YesNo>,
        /// The quoting participant's registration status.
        market_maker_mode: Coded<MarketMakerMode>,
        /// The participant's current registration status.
        market_participant_state: Coded<ParticipantState>,
    }
    /// The market-wide circuit breaker decline levels for the day.
    MwcbDeclineLevel(MwcbDeclineLevelMsg) = b'V' {
        /// The level 1 decline.
        level1: Price8,
        /// The level 2 decline.
        level2: Price8,
        /// The level 3 decline.
        level3: Price8,
    }
    /// A breach of a market-wide circuit breaker level.
    MwcbStatus(MwcbStatusMsg) = b'W' {
        /// The breached level.
        breached_level: Coded<BreachedLevel>,
    }
    /// The anticipated quotation release time of an IPO.
    IpoQuotingPeriod(IpoQuotingPeriodMsg) = b'K' {
        /// The security symbol.
        stock: Stock,
        /// The release time in seconds since midnight.
        ipo_release_time: u32,
        /// Qualifier of the release time.
        ipo_release_qualifier: Coded<IpoReleaseQualifier>,
        /// The IPO price.
        ipo_price: Price4,
    }
    /// The auction collar thresholds of a paused security.
    LuldAuctionCollar(LuldAuctionCollarMsg) = b'J' {
        /// The security symbol.
        stock: Stock,
        /// The reference price used to set the collars.
        reference_price: Price4,
        /// The upper collar price.
        upper_price: Price4,
        /// The lower collar price.
        lower_price: Price4,
        /// The number of extensions to the reopening auction.
        extension: u32,
    }
    /// An operational halt or resumption on a specific market.
    OperationalHalt(OperationalHaltMsg) = b'h' {
        /// The security symbol.
        stock: Stock,
        /// The market affected.
        market_code: Coded<MarketCode>,
        /// Whether the halt is in effect or lifted.
        halt_action: Coded<HaltAction>,
    }
    /// A new order accepted and added to the displayable book, without attribution.
    AddOrder(AddOrderMsg) = b'A' {
        /// The order reference number.
        order_ref: u64,
        /// The side of the order.
        side: Coded<Side>,
        /// The number of shares.
        shares: u32,
        /// The security symbol.
        stock: Stock,
        /// The display price.
        price: Price4,
    }
    /// A new order accepted and added to the displayable book, with market
    /// participant attribution.
    AddOrderMpid(AddOrderMpidMsg) = b'F' {
        /// The order reference number.
        order_ref: u64,
        /// The side of the order.
        side: Coded<Side>,
        /// The number of shares.
        shares: u32,
        /// The security symbol.
        stock: Stock,
        /// The display price.
        price: Price4,
        /// The market participant identifier of the entering firm.
        attribution: Mpid,
    }
    /// An order on the book executed in whole or in part at its display price.
    OrderExecuted(OrderExecutedMsg) = b'E' {
        /// The order reference number.
        order_ref: u64,
        /// The number of shares executed.
        executed_shares: u32,
        /// The match number of the execution.
        match_number: u64,
    }
    /// An order on the book executed in whole or in part at a price different from
    /// its display price.
    OrderExecutedWithPrice(OrderExecutedWithPriceMsg) = b'C' {
        /// The order reference number.
        order_ref: u64,
        /// The number of shares executed.
        executed_shares: u32,
        /// The match number of the execution.
        match_number: u64,
        /// Whether the execution should be included in volume and price statistics.
        printable: Coded<YesNo>,
        /// The price of the execution.
        execution_price: Price4,
    }
    /// An order on the book modified by a partial cancellation.
    OrderCancel(OrderCancelMsg) = b'X' {
        /// The order reference number.
        order_ref: u64,
        /// The number of shares removed.
        cancelled_shares: u32,
    }
    /// An order on the book cancelled in full.
    OrderDelete(OrderDeleteMsg) = b'D' {
        /// The order reference number.
        order_ref: u64,
    }
    /// An order on the book cancel-replaced with a new reference number, price and
    /// size, keeping its side.
    OrderReplace(OrderReplaceMsg) = b'U' {
        /// The reference number of the order being replaced.
        original_order_ref: u64,
        /// The reference number of the replacement order.
        new_order_ref: u64,
        /// The number of shares of the replacement order.
        shares: u32,
        /// The display price of the replacement order.
        price: Price4,
    }
    /// An execution against a non-displayable order. Doesn't affect the book.
    Trade(TradeMsg) = b'P' {
        /// The order reference number, always zero since the order isn't displayed.
        order_ref: u64,
        /// The side of the non-displayed order.
        side: Coded<Side>,
        /// The number of shares executed.
        shares: u32,
        /// The security symbol.
        stock: Stock,
        /// The price of the execution.
        price: Price4,
        /// The match number of the execution.
        match_number: u64,
    }
    /// The bulk print of a Nasdaq cross.
    CrossTrade(CrossTradeMsg) = b'Q' {
        /// The number of shares matched in the cross.
        shares: u64,
        /// The security symbol.
        stock: Stock,
        /// The cross price.
        cross_price: Price4,
        /// The match number of the cross.
        match_number: u64,
        /// The type of cross.
        cross_type: Coded<CrossType>,
    }
    /// An execution broken by Nasdaq after the fact.
    BrokenTrade(BrokenTradeMsg) = b'B' {
        /// The match number of the broken execution.
        match_number: u64,
    }
    /// Net order imbalance indicator, disseminated ahead of a cross.
    Noii(NoiiMsg) = b'I' {
        /// The number of shares that are eligible to be matched at the current
        /// reference price.
        paired_shares: u64,
        /// The number of shares not paired at the current reference price.
        imbalance_shares: u64,
        /// The direction of the imbalance.
        imbalance_direction: Coded<ImbalanceDirection>,
        /// The security symbol.
        stock: Stock,
        /// The hypothetical auction-clearing price for cross orders only.
        far_price: Price4,
        /// The hypothetical auction-clearing price for cross and continuous orders.
        near_price: Price4,
        /// The price at which the NOII shares are being calculated.
        current_reference_price: Price4,
        /// The type of cross.
        cross_type: Coded<CrossType>,
        /// The deviation of the near price from the current reference price.
        price_variation: Coded<PriceVariation>,
    }
    /// Retail price improvement indicator.
    RetailInterest(RetailInterestMsg) = b'N' {
        /// The security symbol.
        stock: Stock,
        /// The sides with retail interest.
        interest_flag: Coded<InterestFlag>,
    }
    /// Direct listing with capital raise price discovery.
    DirectListingPriceDiscovery(DirectListingPriceDiscoveryMsg) = b'O' {
        /// The security symbol.
        stock: Stock,
        /// Whether the security is eligible to open.
        open_eligibility: Coded<YesNo>,
        /// The minimum allowable price.
        minimum_allowable_price: Price4,
        /// The maximum allowable price.
        maximum_allowable_price: Price4,
        /// The near execution price.
        near_execution_price: Price4,
        /// The time at which the near execution price was set, in nanoseconds since
        /// midnight.
        near_execution_time: u64,
        /// The lower price range collar.
        lower_price_range_collar: Price4,
        /// The upper price range collar.
        upper_price_range_collar: Price4,
    }
}

impl Message {
    /// Returns the stock locate code from the header.
    pub fn stock_locate(&self) -> u16 {
        self.header().stock_locate
    }

    /// Returns the timestamp from the header in nanoseconds since midnight.
    pub fn timestamp(&self) -> u64 {
        self.header().timestamp
    }

    /// Returns the type tag as a `char`.
    pub fn tag_char(&self) -> char {
        char::from(self.tag())
    }

    /// Encodes the message into a new buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0; self.spec().length];
        self.encode_into(&mut buf);
        buf
    }

    /// Returns the reference number of the order addressed by the message, for the
    /// message types that act on a single resting order.
    pub fn order_ref(&self) -> Option<u64> {
        match self {
            Message::AddOrder(msg) => Some(msg.order_ref),
            Message::AddOrderMpid(msg) => Some(msg.order_ref),
            Message::OrderExecuted(msg) => Some(msg.order_ref),
            Message::OrderExecutedWithPrice(msg) => Some(msg.order_ref),
            Message::OrderCancel(msg) => Some(msg.order_ref),
            Message::OrderDelete(msg) => Some(msg.order_ref),
            Message::OrderReplace(msg) => Some(msg.original_order_ref),
            _ => None,
        }
    }

    /// Returns the security symbol for the message types that carry one.
    pub fn stock(&self) -> Option<&Stock> {
        match self {
            Message::StockDirectory(msg) => Some(&msg.stock),
            Message::StockTradingAction(msg) => Some(&msg.stock),
            Message::RegShoRestriction(msg) => Some(&msg.stock),
            Message::MarketParticipantPosition(msg) => Some(&msg.stock),
            Message::IpoQuotingPeriod(msg) => Some(&msg.stock),
            Message::LuldAuctionCollar(msg) => Some(&msg.stock),
            Message::OperationalHalt(msg) => Some(&msg.stock),
            Message::AddOrder(msg) => Some(&msg.stock),
            Message::AddOrderMpid(msg) => Some(&msg.stock),
            Message::Trade(msg) => Some(&msg.stock),
            Message::CrossTrade(msg) => Some(&msg.stock),
            Message::Noii(msg) => Some(&msg.stock),
            Message::RetailInterest(msg) => Some(&msg.stock),
            Message::DirectListingPriceDiscovery(msg) => Some(&msg.stock),
            Message::SystemEvent(_)
            | Message::MwcbDeclineLevel(_)
            | Message::MwcbStatus(_)
            | Message::OrderExecuted(_)
            | Message::OrderExecutedWithPrice(_)
            | Message::OrderCancel(_)
            | Message::OrderDelete(_)
            | Message::OrderReplace(_)
            | Message::BrokenTrade(_) => None,
        }
    }

    /// Returns `true` for the message types that mutate an order book.
    pub fn is_book_event(&self) -> bool {
        self.order_ref().is_some()
    }
}
