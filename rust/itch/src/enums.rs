//! Enums for the single-character codes found in ITCH messages.
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{Error, Result};

/// A single-character code with a fixed lookup table, decoded from one byte.
pub trait Code: Copy + TryFrom<u8> + Into<u8> {
    /// The mapped bytes and the name of the variant each maps to.
    const TABLE: &'static [(u8, &'static str)];

    /// Returns the name of the variant mapped from `byte`, if any.
    fn label(byte: u8) -> Option<&'static str> {
        Self::TABLE
            .iter()
            .find_map(|(b, name)| (*b == byte).then_some(*name))
    }
}

/// Declares a `#[repr(u8)]` code enum and its [`Code`] table.
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $byte:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $byte, )+
        }

        impl Code for $name {
            const TABLE: &'static [(u8, &'static str)] =
                &[ $( ($byte, stringify!($variant)), )+ ];
        }

        impl From<$name> for char {
            fn from(value: $name) -> Self {
                char::from(u8::from(value))
            }
        }
    };
}

/// An enumerated field value: either a mapped code or the raw byte that didn't
/// map to any variant.
///
/// Decoding never fails on an unmapped code. The message is still produced with
/// the field marked [`Coded::Invalid`] so a single bad byte doesn't stop a replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Coded<T> {
    /// A byte that mapped to a variant.
    Known(T),
    /// A byte with no mapping for this field.
    Invalid(u8),
}

impl<T: Code> Coded<T> {
    /// Maps `byte` through the lookup table of `T`.
    pub fn from_byte(byte: u8) -> Self {
        T::try_from(byte).map_or(Self::Invalid(byte), Self::Known)
    }

    /// Returns the mapped value, or `None` if the byte was invalid.
    pub fn get(&self) -> Option<T> {
        match self {
            Coded::Known(value) => Some(*value),
            Coded::Invalid(_) => None,
        }
    }

    /// Returns the mapped value.
    ///
    /// # Errors
    /// This function returns an [`Error::InvalidEnumValue`] naming `field` if the byte
    /// was invalid.
    pub fn try_get(&self, field: &'static str) -> Result<T> {
        match self {
            Coded::Known(value) => Ok(*value),
            Coded::Invalid(byte) => Err(Error::InvalidEnumValue { field, byte: *byte }),
        }
    }

    /// Returns the byte as it appeared on the wire.
    pub fn raw(&self) -> u8 {
        match self {
            Coded::Known(value) => (*value).into(),
            Coded::Invalid(byte) => *byte,
        }
    }

    /// Returns `true` if the byte mapped to a variant.
    pub fn is_valid(&self) -> bool {
        matches!(self, Coded::Known(_))
    }
}

impl<T: Code> From<T> for Coded<T> {
    fn from(value: T) -> Self {
        Self::Known(value)
    }
}

code_enum! {
    /// The side of a resting order or of the resting order in a trade.
    Side {
        /// A buy order.
        Buy = b'B',
        /// A sell order.
        Sell = b'S',
    }
}

impl Side {
    /// Returns the opposite side.
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

code_enum! {
    /// A yes or no flag, such as the printable flag of an execution.
    YesNo {
        /// Yes.
        Yes = b'Y',
        /// No.
        No = b'N',
    }
}

impl From<YesNo> for bool {
    fn from(value: YesNo) -> Self {
        value == YesNo::Yes
    }
}

code_enum! {
    /// A yes or no flag that may also be unavailable.
    Indicator {
        /// Yes.
        Yes = b'Y',
        /// No.
        No = b'N',
        /// Not available.
        NotAvailable = b' ',
    }
}

code_enum! {
    /// System event codes.
    SystemEventCode {
        /// Start of messages; the first message sent in any trading day.
        StartOfMessages = b'O',
        /// Start of system hours.
        StartOfSystemHours = b'S',
        /// Start of market hours.
        StartOfMarketHours = b'Q',
        /// End of market hours.
        EndOfMarketHours = b'M',
        /// End of system hours.
        EndOfSystemHours = b'E',
        /// End of messages; always the last message sent in any trading day.
        EndOfMessages = b'C',
    }
}

code_enum! {
    /// The listing market or listing market tier of an issue.
    MarketCategory {
        /// Nasdaq Global Select Market.
        NasdaqGlobalSelect = b'Q',
        /// Nasdaq Global Market.
        NasdaqGlobalMarket = b'G',
        /// Nasdaq Capital Market.
        NasdaqCapitalMarket = b'S',
        /// New York Stock Exchange.
        Nyse = b'N',
        /// NYSE American.
        NyseAmerican = b'A',
        /// NYSE Arca.
        NyseArca = b'P',
        /// Cboe BZX.
        CboeBzx = b'Z',
        /// Investors' Exchange.
        Iex = b'V',
        /// Not available.
        NotAvailable = b' ',
    }
}

code_enum! {
    /// The financial status of a Nasdaq-listed issue.
    FinancialStatus {
        /// Deficient.
        Deficient = b'D',
        /// Delinquent.
        Delinquent = b'E',
        /// Bankrupt.
        Bankrupt = b'Q',
        /// Suspended.
        Suspended = b'S',
        /// Deficient and bankrupt.
        DeficientBankrupt = b'G',
        /// Deficient and delinquent.
        DeficientDelinquent = b'H',
        /// Delinquent and bankrupt.
        DelinquentBankrupt = b'J',
        /// Deficient, delinquent and bankrupt.
        DeficientDelinquentBankrupt = b'K',
        /// Creations and/or redemptions suspended for an exchange traded product.
        CreationsRedemptionsSuspended = b'C',
        /// Normal; the issue is not deficient, delinquent or bankrupt.
        Normal = b'N',
        /// Not available; the issue is not Nasdaq-listed.
        NotAvailable = b' ',
    }
}

code_enum! {
    /// Whether a stock directory message describes a live or a test security.
    Authenticity {
        /// Live or production.
        Production = b'P',
        /// Test.
        Test = b'T',
    }
}

code_enum! {
    /// The Limit Up-Limit Down price band tier of a security.
    LuldTier {
        /// Tier 1 NMS stocks and select ETPs.
        Tier1 = b'1',
        /// Tier 2 NMS stocks.
        Tier2 = b'2',
        /// Not available.
        NotAvailable = b' ',
    }
}

code_enum! {
    /// The trading state of a security across all U.S. equity markets.
    TradingState {
        /// Halted across all U.S. equity markets.
        Halted = b'H',
        /// Paused across all U.S. equity markets.
        Paused = b'P',
        /// Quotation-only period for a cross-SRO halt or pause.
        QuotationOnly = b'Q',
        /// Trading on Nasdaq.
        Trading = b'T',
    }
}

code_enum! {
    /// The Reg SHO short sale price test restriction status.
    RegShoAction {
        /// No price test in place.
        NoPriceTest = b'0',
        /// Restriction in effect due to an intra-day price drop.
        Restricted = b'1',
        /// Restriction remains in effect.
        RestrictionRemains = b'2',
    }
}

code_enum! {
    /// The quoting participant's registration status in relation to an issue.
    MarketMakerMode {
        /// Normal.
        Normal = b'N',
        /// Passive.
        Passive = b'P',
        /// Syndicate.
        Syndicate = b'S',
        /// Pre-syndicate.
        PreSyndicate = b'R',
        /// Penalty.
        Penalty = b'L',
    }
}

code_enum! {
    /// The market participant's current registration status in an issue.
    ParticipantState {
        /// Active.
        Active = b'A',
        /// Excused or withdrawn.
        Excused = b'E',
        /// Withdrawn.
        Withdrawn = b'W',
        /// Suspended.
        Suspended = b'S',
        /// Deleted.
        Deleted = b'D',
    }
}

code_enum! {
    /// The market-wide circuit breaker level that was breached.
    BreachedLevel {
        /// Level 1.
        Level1 = b'1',
        /// Level 2.
        Level2 = b'2',
        /// Level 3.
        Level3 = b'3',
    }
}

code_enum! {
    /// Qualifier of an IPO quotation release time.
    IpoReleaseQualifier {
        /// Anticipated quotation release time.
        Anticipated = b'A',
        /// IPO release cancelled or postponed.
        Cancelled = b'C',
    }
}

code_enum! {
    /// The market of an operational halt.
    MarketCode {
        /// Nasdaq.
        Nasdaq = b'Q',
        /// BX.
        Bx = b'B',
        /// PSX.
        Psx = b'X',
    }
}

code_enum! {
    /// Operational halt status.
    HaltAction {
        /// Operationally halted on the identified market.
        Halted = b'H',
        /// Operational halt lifted and trading resumed.
        Resumed = b'T',
    }
}

code_enum! {
    /// The Nasdaq cross a cross trade or imbalance message refers to.
    CrossType {
        /// Opening cross.
        Opening = b'O',
        /// Closing cross.
        Closing = b'C',
        /// Cross for an IPO or halted security.
        IpoOrHalted = b'H',
        /// Intraday or post-close cross.
        Intraday = b'I',
        /// Extended trading close.
        ExtendedTradingClose = b'A',
    }
}

code_enum! {
    /// The direction of an order imbalance.
    ImbalanceDirection {
        /// Buy imbalance.
        Buy = b'B',
        /// Sell imbalance.
        Sell = b'S',
        /// No imbalance.
        NoImbalance = b'N',
        /// Insufficient orders to calculate.
        Insufficient = b'O',
        /// Paused.
        Paused = b'P',
    }
}

code_enum! {
    /// The absolute deviation of the near indicative clearing price from the
    /// current reference price.
    PriceVariation {
        /// Less than 1%.
        Under1Pct = b'L',
        /// 1 to 1.99%.
        From1To2Pct = b'1',
        /// 2 to 2.99%.
        From2To3Pct = b'2',
        /// 3 to 3.99%.
        From3To4Pct = b'3',
        /// 4 to 4.99%.
        From4To5Pct = b'4',
        /// 5 to 5.99%.
        From5To6Pct = b'5',
        /// 6 to 6.99%.
        From6To7Pct = b'6',
        /// 7 to 7.99%.
        From7To8Pct = b'7',
        /// 8 to 8.99%.
        From8To9Pct = b'8',
        /// 9 to 9.99%.
        From9To10Pct = b'9',
        /// 10 to 19.99%.
        From10To20Pct = b'A',
        /// 20 to 29.99%.
        From20To30Pct = b'B',
        /// 30% or greater.
        Over30Pct = b'C',
        /// Cannot be calculated.
        NotAvailable = b' ',
    }
}

code_enum! {
    /// Retail price improvement interest.
    InterestFlag {
        /// Retail interest on the buy side.
        Buy = b'B',
        /// Retail interest on the sell side.
        Sell = b'S',
        /// Retail interest on both sides.
        Both = b'A',
        /// No retail interest.
        NoInterest = b'N',
    }
}
