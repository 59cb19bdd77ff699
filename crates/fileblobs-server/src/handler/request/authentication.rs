use serde::Deserialize;

/// Local sign-in credentials, sent as a form or JSON.
#[derive(Clone, Deserialize, derive_more::Debug)]
pub struct Login {
    pub username: String,
    #[debug(skip)]
    pub password: String,
}

/// Identity token handed over after an external sign-in.
#[derive(Clone, Deserialize, derive_more::Debug)]
pub struct StoreToken {
    #[debug(skip)]
    pub token: String,
}
