// https://developer.mozilla.org/en-US/docs/Web/HTTP/Basics_of_HTTP/MIME_types/Common_types

macro_rules! mime {
    ($a:ident, $b:literal) => {
        pub const $a: &str = $b;
    };
}

mime!(TEXT_HTML_UTF_8, "text/html; charset=utf-8");
