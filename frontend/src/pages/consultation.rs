use std::rc::Rc;

use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::config;
use crate::consultation::controller::{
    CallSessionController, ConversationRequest, SessionState, StartOutcome,
};
use crate::consultation::signup::{SignupForm, MIN_PASSWORD_LEN};
use crate::consultation::web::{BrowserCamera, DailyCallJoiner, HostedAuth, HttpConversationApi};

const CALL_CONTAINER_ID: &str = "call-frame";
const PREVIEW_ID: &str = "local-preview";

type Controller = CallSessionController<HttpConversationApi, DailyCallJoiner, BrowserCamera>;

fn conversation_request() -> ConversationRequest {
    ConversationRequest {
        persona_id: config::get_persona_id().map(str::to_string),
        replica_id: config::get_replica_id().map(str::to_string),
    }
}

#[function_component(Consultation)]
pub fn consultation() -> Html {
    let phase = use_state(|| SessionState::Idle);
    let error = use_state(|| None::<String>);
    let notice = use_state(|| None::<String>);
    let camera_missing = use_state(|| false);
    let form = use_state(SignupForm::default);

    let controller = {
        let phase = phase.clone();
        use_state(move || {
            Rc::new(
                Controller::new(
                    HttpConversationApi,
                    DailyCallJoiner::new(CALL_CONTAINER_ID),
                    BrowserCamera::new(PREVIEW_ID),
                    conversation_request(),
                )
                .with_observer(move |state| phase.set(state)),
            )
        })
    };
    let auth = use_state(|| Rc::new(HostedAuth::from_config()));

    // Leaving the page must not leave a call or the camera running.
    {
        let controller = (*controller).clone();
        use_effect_with_deps(
            move |_| {
                move || controller.dispose()
            },
            (),
        );
    }

    let on_start = {
        let controller = (*controller).clone();
        let error = error.clone();
        let notice = notice.clone();
        let camera_missing = camera_missing.clone();
        Callback::from(move |_: MouseEvent| {
            let controller = controller.clone();
            let error = error.clone();
            let camera_missing = camera_missing.clone();
            error.set(None);
            notice.set(None);
            wasm_bindgen_futures::spawn_local(async move {
                match controller.start().await {
                    Ok(StartOutcome::Joined { local_preview }) => camera_missing.set(!local_preview),
                    Ok(outcome) => log::debug!("Consultation start ended with {:?}", outcome),
                    Err(e) => error.set(Some(e.user_message().to_string())),
                }
            });
        })
    };

    let on_end = {
        let controller = (*controller).clone();
        let form = form.clone();
        let camera_missing = camera_missing.clone();
        Callback::from(move |_: MouseEvent| {
            if controller.end() {
                camera_missing.set(false);
                form.set(controller.signup_form());
            }
        })
    };

    let on_maybe_later = {
        let controller = (*controller).clone();
        let form = form.clone();
        Callback::from(move |_: MouseEvent| {
            if controller.reset() {
                form.set(controller.signup_form());
            }
        })
    };

    let on_email = {
        let controller = (*controller).clone();
        let form = form.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            controller.set_signup_email(input.value());
            form.set(controller.signup_form());
        })
    };

    let on_password = {
        let controller = (*controller).clone();
        let form = form.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            controller.set_signup_password(input.value());
            form.set(controller.signup_form());
        })
    };

    let on_signup = {
        let controller = (*controller).clone();
        let auth = (*auth).clone();
        let form = form.clone();
        let notice = notice.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            let controller = controller.clone();
            let auth = auth.clone();
            let form = form.clone();
            let notice = notice.clone();
            form.set(SignupForm {
                submitting: true,
                ..controller.signup_form()
            });
            wasm_bindgen_futures::spawn_local(async move {
                match controller.submit_signup(auth.as_ref()).await {
                    Ok(confirmation) => notice.set(Some(confirmation.message())),
                    Err(e) => log::info!("Signup not completed: {}", e),
                }
                form.set(controller.signup_form());
            });
        })
    };

    let in_call = *phase == SessionState::Active;

    html! {
        <section class="consultation">
            {
                match *phase {
                    SessionState::Idle => html! {
                        <div class="consultation-idle">
                            <button class="hero-cta" onclick={on_start}>
                                {"Begin Your Style Consultation"}
                            </button>
                            if let Some(message) = (*error).clone() {
                                <p class="error-message">{message}</p>
                            }
                            if let Some(message) = (*notice).clone() {
                                <p class="success-message">{message}</p>
                            }
                        </div>
                    },
                    SessionState::Requesting => html! {
                        <div class="consultation-status">
                            <div class="spinner"></div>
                            <p>{"Connecting you with Adrian..."}</p>
                        </div>
                    },
                    SessionState::Active => html! {
                        <div class="consultation-controls">
                            if *camera_missing {
                                <p class="info-message">
                                    {"Your camera isn't available, Adrian can still hear you."}
                                </p>
                            }
                            <button class="end-call" onclick={on_end}>{"End Consultation"}</button>
                        </div>
                    },
                    SessionState::Ending => html! {
                        <div class="consultation-status">
                            <p>{"Wrapping up your consultation..."}</p>
                        </div>
                    },
                    SessionState::PostCall => html! {
                        <div class="consultation-signup">
                            <h2>{"Save your style profile"}</h2>
                            <p>{"Create an account to keep Adrian's recommendations and pick up where you left off."}</p>
                            <form onsubmit={on_signup}>
                                <input
                                    type="email"
                                    placeholder="Email"
                                    value={form.email.clone()}
                                    oninput={on_email}
                                    required=true
                                />
                                <input
                                    type="password"
                                    placeholder={format!("Password (at least {} characters)", MIN_PASSWORD_LEN)}
                                    value={form.password.clone()}
                                    oninput={on_password}
                                    required=true
                                />
                                if let Some(message) = form.error.clone() {
                                    <p class="error-message">{message}</p>
                                }
                                <button type="submit" disabled={form.submitting}>
                                    { if form.submitting { "Creating account..." } else { "Create Account" } }
                                </button>
                            </form>
                            <button class="secondary" onclick={on_maybe_later}>{"Maybe later"}</button>
                        </div>
                    },
                }
            }
            // Daily mounts into this container, so it exists in every state.
            <div id={CALL_CONTAINER_ID} class={classes!("call-frame", (!in_call).then_some("hidden"))}></div>
            <video
                id={PREVIEW_ID}
                class={classes!("local-preview", (!in_call).then_some("hidden"))}
                autoplay=true
                playsinline=true
                muted=true
            />
        </section>
    }
}
