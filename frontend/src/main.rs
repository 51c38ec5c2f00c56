use yew::prelude::*;
use yew_router::prelude::*;

mod config;
mod consultation {
    pub mod controller;
    pub mod signup;
    pub mod web;
}
mod pages {
    pub mod consultation;
    pub mod landing;
}
mod utils {
    pub mod api;
}

use pages::landing::Landing;

#[derive(Clone, Routable, PartialEq)]
pub enum Route {
    #[at("/")]
    Home,
    #[not_found]
    #[at("/404")]
    NotFound,
}

fn switch(routes: Route) -> Html {
    match routes {
        Route::Home => html! { <Landing /> },
        Route::NotFound => html! {
            <div class="not-found">
                <h1>{"Page not found"}</h1>
                <Link<Route> to={Route::Home}>{"Back to the consultation"}</Link<Route>>
            </div>
        },
    }
}

#[function_component(App)]
fn app() -> Html {
    html! {
        <BrowserRouter>
            <Switch<Route> render={switch} />
        </BrowserRouter>
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Starting stylist frontend");
    yew::Renderer::<App>::new().render();
}
