pub mod codec;
pub mod event;
pub mod extractor;
pub mod line_parser;
pub mod message;
pub mod topics;
pub mod topup;

pub use codec::LineCodec;
pub use event::{BalanceUpdatePayload, CardStatusPayload, HealthPayload, TopicEvent};
pub use extractor::{FrameExtractor, ScanFrame};
pub use line_parser::{LineParser, ParserState, RawLine};
pub use message::OutboundMessage;
pub use topics::Topics;
pub use topup::TopUpCommand;
