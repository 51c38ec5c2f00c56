use crate::pages::consultation::Consultation;
use yew::prelude::*;

#[function_component(Landing)]
pub fn landing() -> Html {
    // Scroll to top only on initial mount
    {
        use_effect_with_deps(
            move |_| {
                if let Some(window) = web_sys::window() {
                    window.scroll_to_with_x_and_y(0.0, 0.0);
                }
                || ()
            },
            (),
        );
    }
    html! {
        <div class="landing-page">
            <header class="hero">
                <div class="hero-background"></div>
                <div class="hero-content">
                    <div class="hero-header">
                        <h1 class="hero-title">{"Meet Adrian, Your AI Stylist"}</h1>
                        <p class="hero-subtitle">
                            {"A face-to-face video consultation about your wardrobe, your body, and the occasions you dress for."}
                        </p>
                    </div>
                    <Consultation />
                </div>
            </header>

            <section class="how-it-works">
                <h2>{"How it works"}</h2>
                <ol>
                    <li>{"Start a call. Adrian joins in seconds, no download needed."}</li>
                    <li>{"Turn on your camera so Adrian can see what you're wearing."}</li>
                    <li>{"Walk away with concrete outfit ideas, then save them to your account."}</li>
                </ol>
            </section>

            <footer class="footer-section">
                <p class="privacy-note">
                    {"Your camera is only used during the call and is switched off the moment it ends."}
                </p>
            </footer>
        </div>
    }
}
