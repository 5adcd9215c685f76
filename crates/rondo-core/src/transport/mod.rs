pub(crate) mod fsm;
pub(crate) mod metronome;
pub(crate) mod quantizer;
pub(crate) mod sequencer;
pub(crate) mod sync;

pub use fsm::{SequencerStatus, TransportEvent};
pub use metronome::Metronome;
pub use quantizer::{slot_id, Quantizer, QuantizerCallback, SlotId, QUANTIZER_SLOTS};
pub use sequencer::{
    EventBuffer, Sequencer, SequencerEvent, SequencerEventKind, EVENT_BUFFER_CAPACITY,
};
pub use sync::{SyncListener, SyncSource, SyncState, SyncStatus};
