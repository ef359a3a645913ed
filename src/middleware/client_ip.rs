use axum::http::HeaderMap;
use std::net::IpAddr;

const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Resolve the caller IP from trusted headers, in order, then the socket peer.
///
/// Comma-separated header values (`x-forwarded-for`) contribute their first
/// entry. An IPv4-mapped IPv6 prefix is stripped so grants are keyed by the
/// plain IPv4 form.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<IpAddr>, header_names: &[String]) -> String {
    let from_headers = header_names.iter().find_map(|name| {
        headers
            .get(name.as_str())
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    });

    let raw = from_headers
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    strip_ipv4_mapped(&raw).to_string()
}

fn strip_ipv4_mapped(ip: &str) -> &str {
    match ip.get(..IPV4_MAPPED_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX) => &ip[IPV4_MAPPED_PREFIX.len()..],
        _ => ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn names() -> Vec<String> {
        vec!["x-client-ip".to_string(), "x-forwarded-for".to_string()]
    }

    #[test]
    fn client_ip_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-ip", HeaderValue::from_static("10.0.0.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(resolve_client_ip(&headers, None, &names()), "10.0.0.1");
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.2"));
        assert_eq!(resolve_client_ip(&headers, None, &names()), "203.0.113.7");
    }

    #[test]
    fn empty_header_falls_through_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-ip", HeaderValue::from_static("  "));
        let peer: IpAddr = "::ffff:192.168.1.20".parse().unwrap();
        assert_eq!(resolve_client_ip(&headers, Some(peer), &names()), "192.168.1.20");
    }

    #[test]
    fn mapped_prefix_is_stripped_from_headers_too() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-ip", HeaderValue::from_static("::FFFF:10.1.1.1"));
        assert_eq!(resolve_client_ip(&headers, None, &names()), "10.1.1.1");
    }

    #[test]
    fn plain_ipv6_peer_is_untouched() {
        let peer: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(peer), &names()), "2001:db8::1");
    }
}
