//! Classify HTTP status and curl errors into retry policy error kinds.

use super::policy::ErrorKind;

/// Classify an HTTP status the negotiation could not use.
pub fn classify_http_status(code: u32) -> ErrorKind {
    ErrorKind::Status(u16::try_from(code).unwrap_or(u16::MAX))
}

/// Classify a curl error: anything that looks like the network going away is
/// connectivity loss, everything else is fatal for the job.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
        || e.is_http2_stream_error()
    {
        return ErrorKind::Connectivity;
    }
    ErrorKind::Fatal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_kept() {
        assert_eq!(classify_http_status(500), ErrorKind::Status(500));
        assert_eq!(classify_http_status(404), ErrorKind::Status(404));
    }

    #[test]
    fn curl_timeout_and_connect_are_connectivity() {
        // CURLE_OPERATION_TIMEDOUT = 28, CURLE_COULDNT_CONNECT = 7, CURLE_COULDNT_RESOLVE_HOST = 6
        assert_eq!(classify_curl_error(&curl::Error::new(28)), ErrorKind::Connectivity);
        assert_eq!(classify_curl_error(&curl::Error::new(7)), ErrorKind::Connectivity);
        assert_eq!(classify_curl_error(&curl::Error::new(6)), ErrorKind::Connectivity);
    }

    #[test]
    fn curl_malformed_url_is_fatal() {
        // CURLE_URL_MALFORMAT = 3, CURLE_UNSUPPORTED_PROTOCOL = 1
        assert_eq!(classify_curl_error(&curl::Error::new(3)), ErrorKind::Fatal);
        assert_eq!(classify_curl_error(&curl::Error::new(1)), ErrorKind::Fatal);
    }
}
