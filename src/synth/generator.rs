use std::fmt;
use std::sync::Arc;

use crate::dsp::distortion::{distortion_curve, overdrive_curve};
use crate::synth::params::EnvelopeParams;

/// Identifies one tone generator inside a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneratorId(pub u32);

impl fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "generator {}", self.0)
    }
}

/// Transfer curves for a generator's shaper stages.
///
/// `None` means the stage is left out of the chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaperCurves {
    pub distortion: Option<Arc<[f32]>>,
    pub overdrive: Option<Arc<[f32]>>,
}

impl ShaperCurves {
    pub fn for_params(params: &EnvelopeParams) -> Self {
        Self {
            distortion: (params.distortion > 0.0)
                .then(|| Arc::from(distortion_curve(params.distortion))),
            overdrive: (params.overdrive > 0.0)
                .then(|| Arc::from(overdrive_curve(params.overdrive))),
        }
    }
}

/// One independently configured instance of the synthesis chain.
///
/// Every press builds one voice per generator from the generator's current
/// parameter snapshot. Shaper curves are computed here when the parameters
/// change, and shared by every voice built afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneGenerator {
    id: GeneratorId,
    params: EnvelopeParams,
    curves: ShaperCurves,
}

impl ToneGenerator {
    pub fn new(id: GeneratorId, params: EnvelopeParams) -> Self {
        Self {
            id,
            curves: ShaperCurves::for_params(&params),
            params,
        }
    }

    pub fn id(&self) -> GeneratorId {
        self.id
    }

    pub fn params(&self) -> &EnvelopeParams {
        &self.params
    }

    pub fn curves(&self) -> &ShaperCurves {
        &self.curves
    }

    /// Replace the snapshot, recomputing curves only when their amounts move.
    pub(crate) fn set_params(&mut self, params: EnvelopeParams) {
        if params.distortion != self.params.distortion || params.overdrive != self.params.overdrive
        {
            self.curves = ShaperCurves::for_params(&params);
        }
        self.params = params;
    }

    pub(crate) fn set_bend(&mut self, bend: f32) {
        self.params.bend = bend;
    }
}
