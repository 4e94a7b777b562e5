use super::profiles::Platform;
use super::terminal_spawn::Invocation;

/// Open a URL with the system default handler.
pub fn build_open_url_invocation(platform: Platform, url: &str) -> Invocation {
    match platform {
        Platform::MacOs => Invocation::new("open").arg(url),
        Platform::Linux => Invocation::new("xdg-open").arg(url),
        Platform::Windows => Invocation::new("cmd").args(["/C", "start", "", url]),
    }
}

/// Open a URL in the configured embedded browser.
///
/// Without one, falls back to the system handler.
pub fn build_embedded_url_invocation(
    platform: Platform,
    browser: Option<&str>,
    url: &str,
) -> Invocation {
    match browser.map(str::trim).filter(|b| !b.is_empty()) {
        Some(browser) => {
            let mut parts = shlex::split(browser).unwrap_or_else(|| vec![browser.to_string()]);
            if parts.is_empty() {
                return build_open_url_invocation(platform, url);
            }
            let program = parts.remove(0);
            Invocation::new(program).args(parts).arg(url)
        }
        None => build_open_url_invocation(platform, url),
    }
}
