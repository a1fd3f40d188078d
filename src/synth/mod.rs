// Purpose: note lifecycle - voices, the dispatcher that owns them, and the
// sweep that catches missed releases

pub mod dispatcher;
pub mod generator;
pub mod hooks;
pub mod message;
pub mod params;
pub mod reconciler;
pub mod registry;
pub mod voice;

pub use dispatcher::NoteDispatcher;
pub use generator::{GeneratorId, ShaperCurves, ToneGenerator};
pub use hooks::{
    ActivityProbe, ActivitySnapshot, CaptureSource, Collaborators, MidiOutput, NoteIndicator,
    Notice, Silent,
};
pub use message::{MessageReceiver, SynthMessage};
pub use params::{EnvelopeParams, SourceKind, SourceWaveform, PITCH_RANGE};
pub use reconciler::{DeadNoteReconciler, HeldNotes};
pub use registry::{HeldNote, VoiceRegistry};
pub use voice::{LogicalState, ResourceState, Voice};
