use anyhow::Context;
use std::path::Path;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub name: String,
    pub value: String,
    /// Unix seconds; `None` or `0` marks a session cookie.
    pub expires_utc: Option<i64>,
}

impl Cookie {
    fn expired_at(&self, now: i64) -> bool {
        matches!(self.expires_utc, Some(t) if t > 0 && t <= now)
    }
}

#[derive(Debug, Clone)]
pub struct CookieJar {
    pub cookies: Vec<Cookie>,
    pub cookie_header: String,
}

/// Read a Netscape cookie export (browser extensions, yt-dlp, curl).
///
/// With `domain` set, only cookies whose domain contains it are kept.
pub fn load_netscape_cookies(path: &Path, domain: Option<&str>) -> anyhow::Result<CookieJar> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let jar = parse_netscape_cookies(&raw, domain, OffsetDateTime::now_utc().unix_timestamp());
    anyhow::ensure!(
        !jar.cookies.is_empty(),
        "no usable cookies in {}",
        path.display()
    );
    Ok(jar)
}

/// Cookies already expired at `now` (unix seconds) are dropped.
pub fn parse_netscape_cookies(raw: &str, domain: Option<&str>, now: i64) -> CookieJar {
    let mut cookies = Vec::new();

    for line in raw.lines() {
        // curl marks HttpOnly cookies with this prefix; they are still cookies.
        let line = line.trim();
        let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // domain \t flag \t path \t secure \t expiration \t name \t value
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 7 {
            continue;
        }
        if let Some(d) = domain
            && !parts[0].contains(d)
        {
            continue;
        }

        let cookie = Cookie {
            domain: parts[0].to_string(),
            expires_utc: parts[4].parse::<i64>().ok(),
            name: parts[5].to_string(),
            value: parts[6].to_string(),
        };
        if cookie.expired_at(now) {
            tracing::debug!(name = %cookie.name, domain = %cookie.domain, "skipping expired cookie");
            continue;
        }
        cookies.push(cookie);
    }

    let cookie_header = cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");

    CookieJar {
        cookies,
        cookie_header,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "# Netscape HTTP Cookie File\n\
.suno.com\tTRUE\t/\tTRUE\t4102444800\t__client\tabc123\n\
#HttpOnly_.clerk.suno.com\tTRUE\t/\tTRUE\t0\t__session\txyz\n\
.example.com\tTRUE\t/\tFALSE\t0\tother\tnope\n\
broken line\n";

    // 2026-10-16
    const NOW: i64 = 1_792_108_800;

    #[test]
    fn test_parse_with_domain_filter() {
        let jar = parse_netscape_cookies(EXPORT, Some("suno"), NOW);
        assert_eq!(jar.cookies.len(), 2);
        assert_eq!(jar.cookie_header, "__client=abc123; __session=xyz");
        assert_eq!(jar.cookies[0].expires_utc, Some(4102444800));
    }

    #[test]
    fn test_expired_cookies_are_dropped() {
        let raw = ".suno.com\tTRUE\t/\tTRUE\t1700000000\t__client\tstale\n\
.suno.com\tTRUE\t/\tTRUE\t0\t__session\tfresh\n";
        let jar = parse_netscape_cookies(raw, Some("suno"), NOW);
        assert_eq!(jar.cookie_header, "__session=fresh");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, ".suno.com\tTRUE\t/\tTRUE\t1700000000\t__client\tstale\n").unwrap();
        assert!(load_netscape_cookies(&path, Some("suno")).is_err());
    }

    #[test]
    fn test_parse_without_filter_keeps_all() {
        let jar = parse_netscape_cookies(EXPORT, None, NOW);
        assert_eq!(jar.cookies.len(), 3);
        assert!(jar.cookie_header.ends_with("other=nope"));
    }

    #[test]
    fn test_load_rejects_file_without_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, EXPORT).unwrap();

        assert!(load_netscape_cookies(&path, Some("suno")).is_ok());
        assert!(load_netscape_cookies(&path, Some("replicate")).is_err());
        assert!(load_netscape_cookies(&dir.path().join("missing.txt"), None).is_err());
    }
}
