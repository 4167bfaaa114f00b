//! Offline fallback document.

use http::StatusCode;

use crate::request::Response;

/// Body of the offline page.
pub const OFFLINE_HTML: &str = r#"<!DOCTYPE html>
<html lang="ar" dir="rtl">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>غير متصل</title>
<style>
body{font-family:Tajawal,Cairo,sans-serif;background:#0f3d3e;color:#f1f1f1;display:flex;align-items:center;justify-content:center;min-height:100vh;margin:0;text-align:center}
main{padding:2rem}
h1{color:#e2c275}
button{margin-top:1rem;padding:.6rem 1.6rem;border:0;border-radius:.5rem;background:#e2c275;color:#0f3d3e;font-size:1rem}
</style>
</head>
<body>
<main>
<h1>أنت غير متصل بالإنترنت</h1>
<p>تعذر تحميل هذه الصفحة. تحقق من اتصالك ثم حاول مرة أخرى.</p>
<button onclick="location.reload()">إعادة المحاولة</button>
</main>
</body>
</html>
"#;

/// The last-resort response when neither network nor cache can answer.
pub fn offline_response() -> Response {
    Response::new(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_HTML)
        .with_content_type("text/html; charset=utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_response() {
        let response = offline_response();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(response.text(), OFFLINE_HTML);
        assert!(response.text().contains(r#"dir="rtl""#));
        assert!(!response.is_cacheable_success());
    }
}
