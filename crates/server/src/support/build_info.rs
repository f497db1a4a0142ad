#![forbid(unsafe_code)]

pub(crate) fn build_profile_label() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

pub(crate) fn build_git_sha() -> Option<&'static str> {
    option_env!("PMCRMS_GIT_SHA").and_then(|v| {
        let v = v.trim();
        if v.is_empty() { None } else { Some(v) }
    })
}

/// `<version>+git.<sha>.<profile>` or `<version>+<profile>`.
pub(crate) fn build_fingerprint() -> String {
    let version = crate::SERVER_VERSION;
    let profile = build_profile_label();
    match build_git_sha() {
        Some(sha) => format!("{version}+git.{sha}.{profile}"),
        None => format!("{version}+{profile}"),
    }
}
