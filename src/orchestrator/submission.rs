//! Submission handling for user input.
//!
//! Validation happens here, synchronously, before anything reaches the controller.
//! The busy flag is raised before the start command is sent so a second submission
//! cannot slip in while the first is outstanding.

use super::controller::UiCommand;
use crate::model::DownloadRequest;
use crate::view::ViewState;
use tokio::sync::mpsc::UnboundedSender;

pub(crate) const EMPTY_URL_ERROR: &str = "Please enter a valid link";
pub(crate) const DEFAULT_QUALITY: &str = "best";
pub(crate) const DEFAULT_FORMAT: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Submission {
    Sent,
    Invalid(String),
    /// A submission is already outstanding.
    Busy,
    ControllerGone,
}

/// Trim and validate raw input, filling in the default quality and format.
pub(crate) fn build_request(
    raw_url: &str,
    quality: Option<&str>,
    format: Option<&str>,
) -> Result<DownloadRequest, String> {
    let url = raw_url.trim();
    if url.is_empty() {
        return Err(EMPTY_URL_ERROR.to_string());
    }
    let pick = |value: Option<&str>, default: &str| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    Ok(DownloadRequest {
        url: url.to_string(),
        quality: pick(quality, DEFAULT_QUALITY),
        format: pick(format, DEFAULT_FORMAT),
    })
}

pub(crate) fn submit(
    state: &mut ViewState,
    cmd_tx: &UnboundedSender<UiCommand>,
    raw_url: &str,
    quality: Option<&str>,
    format: Option<&str>,
) -> Submission {
    if state.busy {
        return Submission::Busy;
    }
    let request = match build_request(raw_url, quality, format) {
        Ok(r) => r,
        Err(message) => {
            tracing::debug!(%message, "rejected submission");
            state.show_error(message.clone());
            return Submission::Invalid(message);
        }
    };

    state.clear_panels();
    state.busy = true;
    if cmd_tx.send(UiCommand::Start(request)).is_err() {
        state.busy = false;
        state.show_error("Controller is not running");
        return Submission::ControllerGone;
    }
    Submission::Sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn empty_or_whitespace_url_is_rejected_without_a_command() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ViewState::default();

        for raw in ["", "   ", "\t\n"] {
            let outcome = submit(&mut state, &tx, raw, None, None);
            assert_eq!(outcome, Submission::Invalid(EMPTY_URL_ERROR.into()));
            assert_eq!(state.error(), Some(EMPTY_URL_ERROR));
            assert!(!state.busy);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn valid_url_sets_busy_and_sends_defaults() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ViewState::default();
        state.show_error("old error");

        let outcome = submit(&mut state, &tx, "  https://example.com/v/1 ", None, Some(""));
        assert_eq!(outcome, Submission::Sent);
        assert!(state.busy);
        assert!(state.error().is_none());

        match rx.try_recv().unwrap() {
            UiCommand::Start(req) => {
                assert_eq!(req.url, "https://example.com/v/1");
                assert_eq!(req.quality, "best");
                assert_eq!(req.format, "auto");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn explicit_options_are_kept() {
        let req = build_request("https://example.com", Some("720p"), Some("mp4")).unwrap();
        assert_eq!(req.quality, "720p");
        assert_eq!(req.format, "mp4");
    }

    #[test]
    fn second_submission_while_busy_is_refused() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = ViewState::default();

        assert_eq!(
            submit(&mut state, &tx, "https://example.com/a", None, None),
            Submission::Sent
        );
        assert_eq!(
            submit(&mut state, &tx, "https://example.com/b", None, None),
            Submission::Busy
        );
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_controller_releases_busy() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut state = ViewState::default();

        let outcome = submit(&mut state, &tx, "https://example.com", None, None);
        assert_eq!(outcome, Submission::ControllerGone);
        assert!(!state.busy);
        assert!(state.error().is_some());
    }
}
