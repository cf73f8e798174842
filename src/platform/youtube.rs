use super::Platform;

pub const YOUTUBE: Platform = Platform {
    id: "youtube",
    name: "YouTube",
    match_hosts: &["youtube.com", "youtu.be"],
    login_url: "https://www.youtube.com",
    // Authentication cookies live on google.com while playback happens on
    // youtube.com, so both domains must survive the jar filter.
    cookie_domain_suffixes: &["youtube.com", "google.com"],
    auth_cookie_names: &["SAPISID", "SID", "__Secure-3PSID", "__Secure-1PSID"],
};
