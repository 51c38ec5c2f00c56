//! Lifecycle of one video consultation: ask the backend for a conversation,
//! join the call frame, show the local camera, and tear everything down again.
//!
//! The controller is generic over its collaborators so the browser bindings in
//! [`super::web`] and the in-memory fakes in the tests drive the same code.
//! All methods take `&self`; the UI shares the controller through an `Rc` and
//! no internal borrow is held across an `.await`.

use std::cell::RefCell;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::signup::{AuthApi, SignupConfirmation, SignupError, SignupForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting,
    Active,
    Ending,
    PostCall,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Conversation {
    pub conversation_url: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("create-session request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("create-session request could not be sent: {0}")]
    Network(String),
    #[error("create-session response was malformed: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("call frame unavailable: {0}")]
    Unavailable(String),
    #[error("call frame rejected {action}: {message}")]
    Rejected { action: &'static str, message: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera available")]
    NotFound,
    #[error("camera error: {0}")]
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    CreateSession(#[from] ApiError),
    #[error(transparent)]
    Join(#[from] CallError),
}

impl SessionError {
    /// What the visitor sees. Technical details only go to the log.
    pub fn user_message(&self) -> &'static str {
        "We couldn't start your consultation right now. Please try again in a moment."
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// In the call. `local_preview` is false when the camera could not be used.
    Joined { local_preview: bool },
    /// `start()` was called outside `Idle`; nothing happened.
    Rejected(SessionState),
    /// The controller moved on (ended, disposed) while this attempt was in flight.
    Stale,
}

#[async_trait(?Send)]
pub trait ConversationApi {
    async fn create_conversation(&self, request: &ConversationRequest) -> Result<Conversation, ApiError>;
}

/// A joined call. Both operations must tolerate being called more than once.
pub trait RemoteSession {
    fn leave(&mut self) -> Result<(), CallError>;
    fn dispose(&mut self) -> Result<(), CallError>;
}

pub trait CallJoiner {
    type Session: RemoteSession;

    /// Starts joining `url`. The handle is returned once the join is
    /// initiated; completion is reported by the widget itself.
    fn join(&self, url: &str) -> Result<Self::Session, CallError>;
}

pub trait LocalCapture {
    fn attach_preview(&mut self) -> Result<(), DeviceError>;
    /// Stops every track, returning how many were still live.
    fn stop_tracks(&mut self) -> usize;
    fn detach_preview(&mut self);
}

#[async_trait(?Send)]
pub trait CaptureDevice {
    type Capture: LocalCapture;

    async fn acquire_video(&self) -> Result<Self::Capture, DeviceError>;
}

struct Inner<S, C> {
    state: SessionState,
    // Bumped by every start() and by dispose(); continuations compare against it.
    generation: u64,
    remote: Option<S>,
    capture: Option<C>,
    form: SignupForm,
    disposed: bool,
}

pub struct CallSessionController<A, J, D>
where
    A: ConversationApi,
    J: CallJoiner,
    D: CaptureDevice,
{
    api: A,
    joiner: J,
    device: D,
    request: ConversationRequest,
    inner: RefCell<Inner<J::Session, D::Capture>>,
    observer: Option<Box<dyn Fn(SessionState)>>,
}

fn release_remote<S: RemoteSession>(mut session: S) {
    if let Err(e) = session.leave() {
        warn!("Leaving the call failed: {}", e);
    }
    if let Err(e) = session.dispose() {
        warn!("Disposing the call frame failed: {}", e);
    }
}

fn release_capture<C: LocalCapture>(mut capture: C) {
    let stopped = capture.stop_tracks();
    capture.detach_preview();
    debug!("Stopped {} local capture track(s)", stopped);
}

impl<A, J, D> CallSessionController<A, J, D>
where
    A: ConversationApi,
    J: CallJoiner,
    D: CaptureDevice,
{
    pub fn new(api: A, joiner: J, device: D, request: ConversationRequest) -> Self {
        Self {
            api,
            joiner,
            device,
            request,
            inner: RefCell::new(Inner {
                state: SessionState::Idle,
                generation: 0,
                remote: None,
                capture: None,
                form: SignupForm::default(),
                disposed: false,
            }),
            observer: None,
        }
    }

    /// Called after every state change, never while the controller is borrowed.
    pub fn with_observer(mut self, observer: impl Fn(SessionState) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> SessionState {
        self.inner.borrow().state
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    pub fn holds_remote_session(&self) -> bool {
        self.inner.borrow().remote.is_some()
    }

    pub fn holds_local_capture(&self) -> bool {
        self.inner.borrow().capture.is_some()
    }

    pub fn signup_form(&self) -> SignupForm {
        self.inner.borrow().form.clone()
    }

    pub fn set_signup_email(&self, email: impl Into<String>) {
        self.inner.borrow_mut().form.email = email.into();
    }

    pub fn set_signup_password(&self, password: impl Into<String>) {
        self.inner.borrow_mut().form.password = password.into();
    }

    fn notify(&self, state: SessionState) {
        debug!("Consultation state -> {:?}", state);
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }

    fn transition(&self, next: SessionState) {
        self.inner.borrow_mut().state = next;
        self.notify(next);
    }

    fn is_current(&self, generation: u64, expected: SessionState) -> bool {
        let inner = self.inner.borrow();
        !inner.disposed && inner.generation == generation && inner.state == expected
    }

    pub async fn start(&self) -> Result<StartOutcome, SessionError> {
        let generation = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.state != SessionState::Idle {
                debug!("Ignoring start() while {:?}", inner.state);
                return Ok(StartOutcome::Rejected(inner.state));
            }
            inner.generation += 1;
            inner.state = SessionState::Requesting;
            inner.generation
        };
        self.notify(SessionState::Requesting);

        let created = self.api.create_conversation(&self.request).await;
        if !self.is_current(generation, SessionState::Requesting) {
            info!("Discarding create-session response for superseded attempt {}", generation);
            return Ok(StartOutcome::Stale);
        }
        let conversation = match created {
            Ok(conversation) => conversation,
            Err(e) => {
                error!("Creating the conversation failed: {}", e);
                self.transition(SessionState::Idle);
                return Err(e.into());
            }
        };

        // Active is announced before the join; a failed join falls back to Idle.
        self.transition(SessionState::Active);
        match self.joiner.join(&conversation.conversation_url) {
            Ok(session) => self.inner.borrow_mut().remote = Some(session),
            Err(e) => {
                error!("Joining {} failed: {}", conversation.conversation_url, e);
                self.transition(SessionState::Idle);
                return Err(e.into());
            }
        }

        let acquired = self.device.acquire_video().await;
        let mut capture = match acquired {
            Ok(capture) => capture,
            Err(e) => {
                warn!("Continuing without local preview: {}", e);
                return Ok(if self.is_current(generation, SessionState::Active) {
                    StartOutcome::Joined { local_preview: false }
                } else {
                    StartOutcome::Stale
                });
            }
        };
        if !self.is_current(generation, SessionState::Active) {
            info!("Camera arrived after the call ended, releasing it");
            release_capture(capture);
            return Ok(StartOutcome::Stale);
        }
        let local_preview = match capture.attach_preview() {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not attach local preview: {}", e);
                false
            }
        };
        self.inner.borrow_mut().capture = Some(capture);
        Ok(StartOutcome::Joined { local_preview })
    }

    /// Hangs up. Returns false (and does nothing) unless the call is active.
    pub fn end(&self) -> bool {
        let (remote, capture) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.state != SessionState::Active {
                debug!("Ignoring end() while {:?}", inner.state);
                return false;
            }
            inner.state = SessionState::Ending;
            (inner.remote.take(), inner.capture.take())
        };
        self.notify(SessionState::Ending);

        if let Some(remote) = remote {
            release_remote(remote);
        }
        if let Some(capture) = capture {
            release_capture(capture);
        }
        self.transition(SessionState::PostCall);
        true
    }

    /// Back to the landing state, dropping whatever the signup form held.
    pub fn reset(&self) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.state != SessionState::PostCall {
                debug!("Ignoring reset() while {:?}", inner.state);
                return false;
            }
            inner.form.clear();
        }
        self.transition(SessionState::Idle);
        true
    }

    /// Releases everything the controller holds and makes it inert. Safe to
    /// call from any state and more than once.
    pub fn dispose(&self) {
        let (was, remote, capture) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.generation += 1;
            inner.form.clear();
            let was = inner.state;
            if matches!(was, SessionState::Requesting | SessionState::Active) {
                inner.state = SessionState::Ending;
            }
            (was, inner.remote.take(), inner.capture.take())
        };
        info!("Disposing consultation controller (was {:?})", was);
        if matches!(was, SessionState::Requesting | SessionState::Active) {
            self.notify(SessionState::Ending);
        }
        if let Some(remote) = remote {
            release_remote(remote);
        }
        if let Some(capture) = capture {
            release_capture(capture);
        }
    }

    /// Sends the post-call signup form. On success the controller is back in
    /// `Idle`; on failure the form keeps its input and shows the error.
    pub async fn submit_signup<T>(&self, auth: &T) -> Result<SignupConfirmation, SignupError>
    where
        T: AuthApi + ?Sized,
    {
        let (credentials, generation) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.state != SessionState::PostCall || inner.form.submitting {
                return Err(SignupError::Unavailable);
            }
            match inner.form.credentials() {
                Ok(credentials) => {
                    inner.form.error = None;
                    inner.form.submitting = true;
                    (credentials, inner.generation)
                }
                Err(e) => {
                    inner.form.error = Some(e.to_string());
                    return Err(e);
                }
            }
        };

        let result = auth.sign_up(&credentials).await;
        if !self.is_current(generation, SessionState::PostCall) {
            info!("Discarding signup result, the form is gone (accepted: {})", result.is_ok());
            return Err(SignupError::Unavailable);
        }

        {
            let mut inner = self.inner.borrow_mut();
            inner.form.submitting = false;
            if let Err(e) = result {
                warn!("Signup rejected: {}", e);
                inner.form.error = Some(e.to_string());
                return Err(e.into());
            }
        }
        info!("Signup accepted, waiting for email confirmation");
        self.reset();
        Ok(SignupConfirmation {
            email: credentials.email,
        })
    }
}

impl<A, J, D> Drop for CallSessionController<A, J, D>
where
    A: ConversationApi,
    J: CallJoiner,
    D: CaptureDevice,
{
    fn drop(&mut self) {
        self.dispose();
    }
}
