//! Browser implementations of the consultation collaborators: the backend
//! create-conversation call, the Daily Prebuilt call frame, the camera, and
//! the hosted auth service.

use async_trait::async_trait;
use gloo_net::http::Request;
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{DomException, HtmlVideoElement, MediaStream, MediaStreamConstraints, MediaStreamTrack};

use super::controller::{
    ApiError, CallError, CallJoiner, CaptureDevice, Conversation, ConversationApi, ConversationRequest,
    DeviceError, LocalCapture, RemoteSession,
};
use super::signup::{AuthApi, AuthError, Credentials};
use crate::config;
use crate::utils::api::Api;

#[wasm_bindgen]
extern "C" {
    // Provided by the daily-js script tag as `window.DailyIframe`.
    type DailyIframe;

    #[wasm_bindgen(static_method_of = DailyIframe, js_name = createFrame, catch)]
    fn create_frame(parent: &web_sys::HtmlElement, properties: &JsValue) -> Result<DailyCallFrame, JsValue>;

    type DailyCallFrame;

    #[wasm_bindgen(method, catch, js_name = join)]
    fn join_call(this: &DailyCallFrame, properties: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, catch, js_name = leave)]
    fn leave_call(this: &DailyCallFrame) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn destroy(this: &DailyCallFrame) -> Result<js_sys::Promise, JsValue>;
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(value, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

fn set_prop(target: &js_sys::Object, key: &str, value: &JsValue) {
    // Reflect::set only fails on frozen objects, which these never are.
    let _ = js_sys::Reflect::set(target, &JsValue::from_str(key), value);
}

// Settles a widget promise in the background; its outcome is only logged.
fn settle(action: &'static str, promise: js_sys::Promise) {
    spawn_local(async move {
        match JsFuture::from(promise).await {
            Ok(_) => log::debug!("Call frame {} finished", action),
            Err(e) => log::warn!("Call frame {} failed: {}", action, js_message(&e)),
        }
    });
}

pub struct HttpConversationApi;

#[async_trait(?Send)]
impl ConversationApi for HttpConversationApi {
    async fn create_conversation(&self, request: &ConversationRequest) -> Result<Conversation, ApiError> {
        let response = Api::post("/api/consultation/conversation")
            .json(request)
            .map_err(|e| ApiError::Decode(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.ok() {
            let status = response.status();
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ApiError::Status { status, message });
        }
        response
            .json::<Conversation>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Mounts Daily Prebuilt into the element with `container_id`.
pub struct DailyCallJoiner {
    container_id: String,
}

impl DailyCallJoiner {
    pub fn new(container_id: &str) -> Self {
        Self {
            container_id: container_id.to_string(),
        }
    }
}

pub struct DailyCall {
    frame: Option<DailyCallFrame>,
    left: bool,
}

impl CallJoiner for DailyCallJoiner {
    type Session = DailyCall;

    fn join(&self, url: &str) -> Result<DailyCall, CallError> {
        let container = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(&self.container_id))
            .and_then(|e| e.dyn_into::<web_sys::HtmlElement>().ok())
            .ok_or_else(|| CallError::Unavailable(format!("no #{} element", self.container_id)))?;

        let iframe_style = js_sys::Object::new();
        set_prop(&iframe_style, "width", &JsValue::from_str("100%"));
        set_prop(&iframe_style, "height", &JsValue::from_str("100%"));
        set_prop(&iframe_style, "border", &JsValue::from_str("0"));
        let properties = js_sys::Object::new();
        set_prop(&properties, "iframeStyle", &iframe_style);
        set_prop(&properties, "showLeaveButton", &JsValue::TRUE);

        let frame = DailyIframe::create_frame(&container, &properties)
            .map_err(|e| CallError::Unavailable(js_message(&e)))?;

        let join_properties = js_sys::Object::new();
        set_prop(&join_properties, "url", &JsValue::from_str(url));
        match frame.join_call(&join_properties) {
            Ok(promise) => settle("join", promise),
            Err(e) => {
                // The frame exists already and must not outlive the failure.
                if let Ok(promise) = frame.destroy() {
                    settle("destroy", promise);
                }
                return Err(CallError::Rejected {
                    action: "join",
                    message: js_message(&e),
                });
            }
        }
        Ok(DailyCall {
            frame: Some(frame),
            left: false,
        })
    }
}

impl RemoteSession for DailyCall {
    fn leave(&mut self) -> Result<(), CallError> {
        let Some(frame) = self.frame.as_ref() else {
            return Ok(());
        };
        if self.left {
            return Ok(());
        }
        self.left = true;
        let promise = frame.leave_call().map_err(|e| CallError::Rejected {
            action: "leave",
            message: js_message(&e),
        })?;
        settle("leave", promise);
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), CallError> {
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };
        let promise = frame.destroy().map_err(|e| CallError::Rejected {
            action: "destroy",
            message: js_message(&e),
        })?;
        settle("destroy", promise);
        Ok(())
    }
}

/// The visitor's camera, previewed in the `<video>` with `preview_id`.
pub struct BrowserCamera {
    preview_id: String,
}

impl BrowserCamera {
    pub fn new(preview_id: &str) -> Self {
        Self {
            preview_id: preview_id.to_string(),
        }
    }
}

fn device_error(value: JsValue) -> DeviceError {
    match value.dyn_ref::<DomException>().map(|e| e.name()) {
        Some(name) if name == "NotAllowedError" || name == "SecurityError" => DeviceError::PermissionDenied,
        Some(name) if name == "NotFoundError" || name == "OverconstrainedError" => DeviceError::NotFound,
        _ => DeviceError::Other(js_message(&value)),
    }
}

#[async_trait(?Send)]
impl CaptureDevice for BrowserCamera {
    type Capture = BrowserCapture;

    async fn acquire_video(&self) -> Result<BrowserCapture, DeviceError> {
        let window = web_sys::window().ok_or_else(|| DeviceError::Other("no window".to_string()))?;
        let devices = window.navigator().media_devices().map_err(device_error)?;

        let constraints = MediaStreamConstraints::new();
        constraints.set_video(&JsValue::TRUE);
        constraints.set_audio(&JsValue::FALSE);
        let promise = devices
            .get_user_media_with_constraints(&constraints)
            .map_err(device_error)?;
        let stream = JsFuture::from(promise)
            .await
            .map_err(device_error)?
            .dyn_into::<MediaStream>()
            .map_err(|_| DeviceError::Other("getUserMedia did not return a MediaStream".to_string()))?;

        Ok(BrowserCapture {
            stream,
            preview_id: self.preview_id.clone(),
            preview: None,
        })
    }
}

pub struct BrowserCapture {
    stream: MediaStream,
    preview_id: String,
    preview: Option<HtmlVideoElement>,
}

impl LocalCapture for BrowserCapture {
    fn attach_preview(&mut self) -> Result<(), DeviceError> {
        let video = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(&self.preview_id))
            .and_then(|e| e.dyn_into::<HtmlVideoElement>().ok())
            .ok_or_else(|| DeviceError::Other(format!("no <video id={}> to preview into", self.preview_id)))?;
        video.set_muted(true);
        video.set_src_object(Some(&self.stream));
        self.preview = Some(video);
        Ok(())
    }

    fn stop_tracks(&mut self) -> usize {
        let mut stopped = 0;
        for track in self.stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                if track.ready_state() == web_sys::MediaStreamTrackState::Live {
                    stopped += 1;
                }
                track.stop();
            }
        }
        stopped
    }

    fn detach_preview(&mut self) {
        if let Some(video) = self.preview.take() {
            video.set_src_object(None);
        }
    }
}

#[derive(Deserialize)]
struct AuthErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

/// GoTrue-compatible signup endpoint of the hosted auth service.
pub struct HostedAuth {
    base_url: String,
    anon_key: String,
}

impl HostedAuth {
    pub fn from_config() -> Self {
        Self {
            base_url: config::get_auth_url().trim_end_matches('/').to_string(),
            anon_key: config::get_auth_anon_key().to_string(),
        }
    }
}

#[async_trait(?Send)]
impl AuthApi for HostedAuth {
    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let response = Request::post(&format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.anon_key)
            .header("Authorization", &format!("Bearer {}", self.anon_key))
            .json(credentials)
            .map_err(|e| AuthError::Network(e.to_string()))?
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if response.ok() {
            return Ok(());
        }
        let message = response
            .json::<AuthErrorBody>()
            .await
            .ok()
            .and_then(|body| body.msg.or(body.error_description).or(body.message))
            .unwrap_or_else(|| "Sign up failed, please try again".to_string());
        Err(AuthError::Rejected(message))
    }
}
