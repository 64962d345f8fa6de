//! Status, output and diagnostics returned by every pipeline stage

use crate::{Blob, EncodedBlob, Error, HResult, Result};
use dxcompiler::Diagnostics;

/// Outcome of a pipeline stage
///
/// A result blob is present exactly when the status is success. Diagnostics
/// may accompany either outcome: warnings on success, errors on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    status: HResult,
    result: Option<Blob>,
    diagnostics: Option<EncodedBlob>,
}

impl OperationResult {
    /// Successful result carrying `result`
    pub fn success(result: Blob, diagnostics: Option<EncodedBlob>) -> Self {
        OperationResult {
            status: HResult::S_OK,
            result: Some(result),
            diagnostics,
        }
    }

    /// Failed result.
    ///
    /// A non-failing `status` is replaced with `E_FAIL` so that a result
    /// without output can never report success.
    pub fn failure(status: HResult, diagnostics: Option<EncodedBlob>) -> Self {
        let status = if status.is_error() {
            status
        } else {
            HResult::E_FAIL
        };
        OperationResult {
            status,
            result: None,
            diagnostics,
        }
    }

    /// Failed result with a single line of diagnostics text
    pub fn from_error(err: &Error) -> Self {
        Self::failure(err.hresult(), Some(EncodedBlob::from_text(format!("error: {err}\n"))))
    }

    /// Status code, 0 on success
    pub fn status(&self) -> HResult {
        self.status
    }

    /// Returns true if the stage succeeded
    pub fn is_success(&self) -> bool {
        self.status == HResult::S_OK
    }

    /// Output blob, present only on success
    pub fn result(&self) -> Option<&Blob> {
        self.result.as_ref()
    }

    /// Diagnostics blob, absent when the stage reported nothing
    pub fn diagnostics(&self) -> Option<&EncodedBlob> {
        self.diagnostics.as_ref()
    }

    /// Diagnostics decoded to text, empty when there are none
    pub fn diagnostics_text(&self) -> String {
        self.diagnostics
            .as_ref()
            .and_then(|d| d.to_text().ok())
            .unwrap_or_default()
    }

    /// Splits the result into its three parts
    pub fn into_parts(self) -> (HResult, Option<Blob>, Option<EncodedBlob>) {
        (self.status, self.result, self.diagnostics)
    }

    /// Converts to a `Result`, building the error from the status and
    /// diagnostics text with `make_error`.
    pub fn into_result(
        self,
        make_error: impl FnOnce(HResult, String) -> Error,
    ) -> Result<Blob> {
        let message = self.diagnostics_text();
        match self.result {
            Some(blob) => Ok(blob),
            None => Err(make_error(self.status, message)),
        }
    }
}

/// Renders diagnostics into a UTF-8 blob, or `None` when there are none
pub(crate) fn diagnostics_blob(diagnostics: &Diagnostics) -> Option<EncodedBlob> {
    if diagnostics.is_empty() {
        None
    } else {
        Some(EncodedBlob::from_text(diagnostics.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_has_result() {
        let result = OperationResult::success(Blob::new(4), None);
        assert!(result.is_success());
        assert_eq!(result.status(), HResult::S_OK);
        assert_eq!(result.result().map(Blob::len), Some(4));
        assert!(result.diagnostics().is_none());
        assert_eq!(result.diagnostics_text(), "");
    }

    #[test]
    fn test_failure_never_reports_success() {
        let result = OperationResult::failure(HResult::S_OK, None);
        assert_eq!(result.status(), HResult::E_FAIL);
        assert!(result.result().is_none());
    }

    #[test]
    fn test_from_error() {
        let result = OperationResult::from_error(&Error::IndexOutOfRange { index: 3, count: 2 });
        assert_eq!(result.status(), HResult::E_INVALIDARG);
        assert!(result.diagnostics_text().contains("Index 3 is out of range"));
        let err = result
            .into_result(|hresult, message| Error::Assembly { hresult, message })
            .unwrap_err();
        assert_eq!(err.hresult(), HResult::E_INVALIDARG);
    }
}
