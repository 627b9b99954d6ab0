// Typed API routes and their authentication class

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Method;
use std::fmt;

/// Bytes escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

fn decode_segment(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Which credential a route needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthClass {
    /// Reachable before login, authorized with the app token
    Public,
    /// Needs the user access token
    Authenticated,
    /// The config fetch that produces the app token; sent with no credential
    Bootstrap,
    /// Token refresh; the caller attaches the refresh token itself
    Refresh,
}

/// Base URL a route is served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

/// Every endpoint the client knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    // Auth primitives and registration
    LoginWithEmail,
    LoginSocial,
    RegisterSocial,
    CheckEmail { email: String },
    SignUpWithEmail,
    SignUpWithEmailV2,
    ResendVerification,
    ForgotPassword,
    ResetPassword,
    RefreshToken,
    Logout,

    // Current user
    Me,
    UpdateMe,
    UserStats,
    UserRestrictions,

    // Config bootstrap
    GetConfig { domain_name: Option<String> },

    // Apps (agents)
    CreateApp,
    ListApps { query: String },
    GetApp { app_id: String },
    UpdateApp { app_id: String },
    DeleteApp { app_id: String },
    CreateAppChat { app_id: String },
    DefaultRooms { app_id: String },

    // Knowledge sources
    SiteCrawl { app_id: String },
    SiteCrawlReindex { app_id: String },
    DeleteSiteCrawlUrls { app_id: String },
    UploadSourceDocs { app_id: String },
    DeleteSourceDoc { app_id: String, file_id: String },

    // Files and documents
    UploadFile,
    ListDocuments { wallet: String },
    CreateDocument,
    DeleteDocument { id: String },

    /// Anything else; always authenticated
    Custom { method: Method, path: String },
}

impl Route {
    /// Credential class of this route. Exhaustive so new routes must be classified.
    pub fn auth_class(&self) -> AuthClass {
        match self {
            Route::LoginWithEmail
            | Route::LoginSocial
            | Route::RegisterSocial
            | Route::CheckEmail { .. }
            | Route::SignUpWithEmail
            | Route::SignUpWithEmailV2
            | Route::ResendVerification
            | Route::ForgotPassword
            | Route::ResetPassword => AuthClass::Public,

            Route::RefreshToken => AuthClass::Refresh,

            Route::GetConfig { .. } => AuthClass::Bootstrap,

            Route::Logout
            | Route::Me
            | Route::UpdateMe
            | Route::UserStats
            | Route::UserRestrictions
            | Route::CreateApp
            | Route::ListApps { .. }
            | Route::GetApp { .. }
            | Route::UpdateApp { .. }
            | Route::DeleteApp { .. }
            | Route::CreateAppChat { .. }
            | Route::DefaultRooms { .. }
            | Route::SiteCrawl { .. }
            | Route::SiteCrawlReindex { .. }
            | Route::DeleteSiteCrawlUrls { .. }
            | Route::UploadSourceDocs { .. }
            | Route::DeleteSourceDoc { .. }
            | Route::UploadFile
            | Route::ListDocuments { .. }
            | Route::CreateDocument
            | Route::DeleteDocument { .. }
            | Route::Custom { .. } => AuthClass::Authenticated,
        }
    }

    /// A 401 from these means bad credentials, not an expired session
    pub fn is_auth_primitive(&self) -> bool {
        matches!(
            self,
            Route::LoginWithEmail | Route::LoginSocial | Route::RefreshToken
        )
    }

    pub fn version(&self) -> ApiVersion {
        match self {
            Route::SignUpWithEmailV2 => ApiVersion::V2,
            _ => ApiVersion::V1,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Route::CheckEmail { .. }
            | Route::Me
            | Route::UserStats
            | Route::UserRestrictions
            | Route::GetConfig { .. }
            | Route::ListApps { .. }
            | Route::GetApp { .. }
            | Route::DefaultRooms { .. }
            | Route::ListDocuments { .. } => Method::GET,

            Route::UpdateMe | Route::UpdateApp { .. } => Method::PUT,

            Route::DeleteApp { .. }
            | Route::DeleteSiteCrawlUrls { .. }
            | Route::DeleteSourceDoc { .. }
            | Route::DeleteDocument { .. } => Method::DELETE,

            Route::Custom { method, .. } => method.clone(),

            _ => Method::POST,
        }
    }

    /// Path relative to the API base, including any query string
    pub fn path(&self) -> String {
        match self {
            Route::LoginWithEmail => "/users/login-with-email".to_string(),
            Route::LoginSocial => "/users/login".to_string(),
            Route::RegisterSocial => "/users".to_string(),
            Route::CheckEmail { email } => format!("/users/checkEmail/{}", segment(email)),
            Route::SignUpWithEmail | Route::SignUpWithEmailV2 => {
                "/users/sign-up-with-email".to_string()
            }
            Route::ResendVerification => "/users/sign-up-resend-email".to_string(),
            Route::ForgotPassword => "/users/forgot".to_string(),
            Route::ResetPassword => "/users/reset".to_string(),
            Route::RefreshToken => "/users/login/refresh".to_string(),
            Route::Logout => "/users/logout".to_string(),

            Route::Me => "/users/me".to_string(),
            Route::UpdateMe => "/users".to_string(),
            Route::UserStats => "/users/me/stats".to_string(),
            Route::UserRestrictions => "/users/me/restrictions".to_string(),

            Route::GetConfig { domain_name } => match domain_name {
                Some(domain) => format!(
                    "/apps/get-config?domainName={}",
                    url::form_urlencoded::byte_serialize(domain.as_bytes()).collect::<String>()
                ),
                None => "/apps/get-config".to_string(),
            },

            Route::CreateApp => "/apps".to_string(),
            Route::ListApps { query } if query.is_empty() => "/apps".to_string(),
            Route::ListApps { query } => format!("/apps?{}", query),
            Route::GetApp { app_id } | Route::UpdateApp { app_id } | Route::DeleteApp { app_id } => {
                format!("/apps/{}", segment(app_id))
            }
            Route::CreateAppChat { app_id } => {
                format!("/apps/create-app-chat/{}", segment(app_id))
            }
            Route::DefaultRooms { app_id } => {
                format!("/apps/get-default-rooms/app-id/{}", segment(app_id))
            }

            Route::SiteCrawl { app_id } => format!("/sources/site-crawl/{}", segment(app_id)),
            Route::SiteCrawlReindex { app_id } => {
                format!("/sources/site-crawl-reindex/{}", segment(app_id))
            }
            Route::DeleteSiteCrawlUrls { app_id } => {
                format!("/sources/site-crawl-v2/url/{}", segment(app_id))
            }
            Route::UploadSourceDocs { app_id } => {
                format!("/sources/docs/{}", segment(app_id))
            }
            Route::DeleteSourceDoc { app_id, file_id } => {
                format!("/sources/docs/{}/{}", segment(app_id), segment(file_id))
            }

            Route::UploadFile => "/files".to_string(),
            Route::ListDocuments { wallet } => format!("/docs/{}", segment(wallet)),
            Route::CreateDocument => "/docs".to_string(),
            Route::DeleteDocument { id } => format!("/docs/{}", segment(id)),

            Route::Custom { path, .. } => path.clone(),
        }
    }

    /// Map a raw method and path onto a known route. Unknown shapes become `Custom`.
    pub fn parse(method: Method, path: &str) -> Route {
        let (bare, query) = match path.split_once('?') {
            Some((bare, query)) => (bare, Some(query)),
            None => (path, None),
        };
        let segments: Vec<&str> = bare.trim_matches('/').split('/').collect();

        let known = match (&method, segments.as_slice(), query) {
            (&Method::POST, ["users", "login-with-email"], None) => Some(Route::LoginWithEmail),
            (&Method::POST, ["users", "login"], None) => Some(Route::LoginSocial),
            (&Method::POST, ["users", "login", "refresh"], None) => Some(Route::RefreshToken),
            (&Method::POST, ["users"], None) => Some(Route::RegisterSocial),
            (&Method::PUT, ["users"], None) => Some(Route::UpdateMe),
            (&Method::GET, ["users", "checkEmail", email], None) if !email.is_empty() => {
                Some(Route::CheckEmail {
                    email: decode_segment(email),
                })
            }
            (&Method::POST, ["users", "sign-up-with-email"], None) => Some(Route::SignUpWithEmail),
            (&Method::POST, ["users", "sign-up-resend-email"], None) => {
                Some(Route::ResendVerification)
            }
            (&Method::POST, ["users", "forgot"], None) => Some(Route::ForgotPassword),
            (&Method::POST, ["users", "reset"], None) => Some(Route::ResetPassword),
            (&Method::POST, ["users", "logout"], None) => Some(Route::Logout),
            (&Method::GET, ["users", "me"], None) => Some(Route::Me),
            (&Method::GET, ["users", "me", "stats"], None) => Some(Route::UserStats),
            (&Method::GET, ["users", "me", "restrictions"], None) => Some(Route::UserRestrictions),
            (&Method::GET, ["apps", "get-config"], query) => Some(Route::GetConfig {
                domain_name: query.and_then(|q| {
                    url::form_urlencoded::parse(q.as_bytes())
                        .find(|(key, _)| key == "domainName")
                        .map(|(_, value)| value.into_owned())
                }),
            }),
            (&Method::POST, ["apps"], None) => Some(Route::CreateApp),
            (&Method::GET, ["apps"], query) => Some(Route::ListApps {
                query: query.unwrap_or_default().to_string(),
            }),
            (&Method::GET, ["apps", id], None) => Some(Route::GetApp {
                app_id: decode_segment(id),
            }),
            (&Method::PUT, ["apps", id], None) => Some(Route::UpdateApp {
                app_id: decode_segment(id),
            }),
            (&Method::DELETE, ["apps", id], None) => Some(Route::DeleteApp {
                app_id: decode_segment(id),
            }),
            (&Method::POST, ["files"], None) => Some(Route::UploadFile),
            (&Method::POST, ["docs"], None) => Some(Route::CreateDocument),
            (&Method::GET, ["docs", wallet], None) => Some(Route::ListDocuments {
                wallet: decode_segment(wallet),
            }),
            (&Method::DELETE, ["docs", id], None) => Some(Route::DeleteDocument {
                id: decode_segment(id),
            }),
            _ => None,
        };

        known.unwrap_or_else(|| Route::Custom {
            method,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_routes() -> Vec<Route> {
        vec![
            Route::LoginWithEmail,
            Route::LoginSocial,
            Route::RegisterSocial,
            Route::CheckEmail {
                email: "a@b.co".to_string(),
            },
            Route::SignUpWithEmail,
            Route::SignUpWithEmailV2,
            Route::ResendVerification,
            Route::ForgotPassword,
            Route::ResetPassword,
        ]
    }

    #[test]
    fn test_public_routes() {
        for route in public_routes() {
            assert_eq!(route.auth_class(), AuthClass::Public, "{}", route);
        }
    }

    #[test]
    fn test_special_routes() {
        assert_eq!(Route::RefreshToken.auth_class(), AuthClass::Refresh);
        assert_eq!(
            Route::GetConfig { domain_name: None }.auth_class(),
            AuthClass::Bootstrap
        );
    }

    #[test]
    fn test_everything_else_is_authenticated() {
        let routes = vec![
            Route::Me,
            Route::Logout,
            Route::ListApps {
                query: String::new(),
            },
            Route::SiteCrawl {
                app_id: "a1".to_string(),
            },
            Route::DeleteDocument {
                id: "d1".to_string(),
            },
            Route::Custom {
                method: Method::GET,
                path: "/users/login-with-email".to_string(),
            },
        ];
        for route in routes {
            assert_eq!(route.auth_class(), AuthClass::Authenticated, "{}", route);
        }
    }

    #[test]
    fn test_auth_primitives() {
        assert!(Route::LoginWithEmail.is_auth_primitive());
        assert!(Route::LoginSocial.is_auth_primitive());
        assert!(Route::RefreshToken.is_auth_primitive());
        assert!(!Route::ForgotPassword.is_auth_primitive());
        assert!(!Route::Me.is_auth_primitive());
    }

    #[test]
    fn test_method_and_path() {
        assert_eq!(Route::LoginWithEmail.to_string(), "POST /users/login-with-email");
        assert_eq!(Route::Me.to_string(), "GET /users/me");
        assert_eq!(
            Route::GetConfig {
                domain_name: Some("acme".to_string())
            }
            .to_string(),
            "GET /apps/get-config?domainName=acme"
        );
        assert_eq!(
            Route::DeleteSourceDoc {
                app_id: "a1".to_string(),
                file_id: "f1".to_string()
            }
            .to_string(),
            "DELETE /sources/docs/a1/f1"
        );
        assert_eq!(Route::SignUpWithEmailV2.version(), ApiVersion::V2);
        assert_eq!(Route::SignUpWithEmail.version(), ApiVersion::V1);
    }

    #[test]
    fn test_parse_known_routes() {
        assert_eq!(
            Route::parse(Method::POST, "/users/login-with-email"),
            Route::LoginWithEmail
        );
        assert_eq!(
            Route::parse(Method::POST, "/users/login/refresh"),
            Route::RefreshToken
        );
        assert_eq!(
            Route::parse(Method::GET, "/users/checkEmail/a@b.co"),
            Route::CheckEmail {
                email: "a@b.co".to_string()
            }
        );
        assert_eq!(Route::parse(Method::POST, "/users"), Route::RegisterSocial);
        assert_eq!(
            Route::parse(Method::GET, "/apps/get-config?domainName=acme"),
            Route::GetConfig {
                domain_name: Some("acme".to_string())
            }
        );
        assert_eq!(
            Route::parse(Method::GET, "/apps?limit=10&offset=0"),
            Route::ListApps {
                query: "limit=10&offset=0".to_string()
            }
        );
    }

    #[test]
    fn test_path_segments_are_escaped() {
        let route = Route::CheckEmail {
            email: "a#b?c@d.co".to_string(),
        };
        assert_eq!(route.path(), "/users/checkEmail/a%23b%3Fc@d.co");
        assert_eq!(Route::parse(Method::GET, &route.path()), route);

        let route = Route::DeleteSourceDoc {
            app_id: "a1".to_string(),
            file_id: "dir/file name".to_string(),
        };
        assert_eq!(route.path(), "/sources/docs/a1/dir%2Ffile%20name");
    }

    #[test]
    fn test_parse_get_config_query() {
        let route = Route::parse(Method::GET, "/apps/get-config?domainName=acme%20corp");
        assert_eq!(
            route,
            Route::GetConfig {
                domain_name: Some("acme corp".to_string())
            }
        );
        assert_eq!(route.path(), "/apps/get-config?domainName=acme+corp");

        assert_eq!(
            Route::parse(Method::GET, "/apps/get-config?x=1&domainName=acme"),
            Route::GetConfig {
                domain_name: Some("acme".to_string())
            }
        );
        assert_eq!(
            Route::parse(Method::GET, "/apps/get-config?x=1"),
            Route::GetConfig { domain_name: None }
        );
    }

    #[test]
    fn test_parse_respects_method() {
        // GET /users is not registration
        assert_eq!(Route::parse(Method::GET, "/users").auth_class(), AuthClass::Authenticated);
        assert_eq!(Route::parse(Method::POST, "/users").auth_class(), AuthClass::Public);
        assert_eq!(
            Route::parse(Method::GET, "/users/checkEmail/").auth_class(),
            AuthClass::Authenticated
        );
    }

    #[test]
    fn test_parse_round_trips_known_paths() {
        for route in public_routes()
            .into_iter()
            .filter(|r| r.version() == ApiVersion::V1)
        {
            assert_eq!(Route::parse(route.method(), &route.path()), route);
        }
    }

    #[test]
    fn test_parse_unknown_is_custom() {
        let route = Route::parse(Method::PATCH, "/sources/whatever/1");
        assert_eq!(
            route,
            Route::Custom {
                method: Method::PATCH,
                path: "/sources/whatever/1".to_string()
            }
        );
    }
}
