pub mod envelope;
pub mod event;
pub mod history;
pub mod output;

pub use envelope::{BufferedEnvelope, EnvelopeBody, RawEnvelope};
pub use event::{EventCallback, EventEnvelope, SlackEvent};
pub use history::{HistoryResponse, ResponseMetadata};
pub use output::OutputEvent;
