use super::Platform;

pub const BILIBILI: Platform = Platform {
    id: "bilibili",
    name: "Bilibili",
    match_hosts: &["bilibili.com", "b23.tv"],
    login_url: "https://www.bilibili.com",
    cookie_domain_suffixes: &["bilibili.com"],
    // SESSDATA is the session token used for logged-in access.
    auth_cookie_names: &["SESSDATA"],
};
