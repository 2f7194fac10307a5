use rocket::{Catcher, Route};

mod auth;
mod catchers;
mod survey;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(survey::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers::catchers()
}
