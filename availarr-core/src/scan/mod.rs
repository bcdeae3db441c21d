//! Library scan passes.

mod context;
pub mod observe;
pub mod orchestrator;

pub use observe::{expected_seasons, observe_item};
pub use orchestrator::ScanOrchestrator;

use availarr_model::ScanErrorKind;

use crate::error::AvailarrError;
use crate::providers::ProviderError;
use crate::sources::SourceError;

/// Maps an error to the pass taxonomy. `fallback` is used when the error
/// itself does not say where it belongs.
pub(crate) fn classify(err: &AvailarrError, fallback: ScanErrorKind) -> ScanErrorKind {
    if err.is_transient() {
        return ScanErrorKind::TransientNetwork;
    }
    match err {
        AvailarrError::Source(SourceError::Parse(_))
        | AvailarrError::Provider(ProviderError::ParseError(_))
        | AvailarrError::InvalidData(_)
        | AvailarrError::Serialization(_) => ScanErrorKind::DataInconsistency,
        AvailarrError::Source(SourceError::Unauthorized(_) | SourceError::Config(_)) => {
            ScanErrorKind::SourceOutage
        }
        _ => fallback,
    }
}
