//! Forensic checks, grouped by pipeline stage.
//!
//! Every check is a pure function over the read-only `CheckContext`. The orchestrator
//! runs each one through [`guarded`] so a failing computation degrades to a
//! low-confidence informational result instead of aborting the run.

pub mod compression;
pub mod ela;
pub mod file_checks;
pub mod metadata_checks;
pub mod pixel_consistency;
pub mod social;

use crate::buffer::ImageBuffer;
use crate::check::CheckResult;
use crate::image_formats::DetectedFormat;
use crate::img_errors::Result;
use crate::pixel_math::{HeatmapPalette, LumaPlane};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, warn};

/// Read-only inputs shared by the checks of one run.
pub struct CheckContext<'a> {
    pub buffer: &'a ImageBuffer,
    pub format: Option<DetectedFormat>,
    pub luma: LumaPlane,
    pub palette: HeatmapPalette,
}

impl<'a> CheckContext<'a> {
    pub fn new(buffer: &'a ImageBuffer, format: Option<DetectedFormat>, palette: HeatmapPalette) -> Self {
        Self {
            buffer,
            format,
            luma: LumaPlane::from_rgba(&buffer.pixels),
            palette,
        }
    }

    pub fn is_jpeg(&self) -> bool {
        self.format == Some(DetectedFormat::Jpeg)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Run an optional check at its own failure boundary.
///
/// `Ok(None)` means the check does not apply and is omitted from the report.
pub fn guarded<F>(id: &'static str, name: &'static str, check: F) -> Option<CheckResult>
where
    F: FnOnce() -> Result<Option<CheckResult>>,
{
    let start = Instant::now();
    let result = match panic::catch_unwind(AssertUnwindSafe(check)) {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!(check = id, error = %e, "check failed, downgrading to info");
            Some(CheckResult::failed(id, name, &e.to_string()))
        }
        Err(payload) => {
            let msg = panic_message(payload);
            warn!(check = id, error = %msg, "check panicked, downgrading to info");
            Some(CheckResult::failed(id, name, &msg))
        }
    };

    match &result {
        Some(r) => debug!(
            check = id,
            status = %r.status,
            confidence = r.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "check finished"
        ),
        None => debug!(check = id, "check not applicable, omitted"),
    }
    result
}
