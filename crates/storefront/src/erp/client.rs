//! HTTP client for the ERP RPC.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, COOKIE, RETRY_AFTER};
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument, warn};
use url::Url;

use tradedesk_core::{
    CartChange, CatalogItem, CurrencyCode, Email, ItemCode, ItemPage, LineDraft, Quotation,
    QuotationName, QuotationSummary, Statement, WarehouseName,
};

use crate::cart::QuotationApi;
use crate::config::ErpConfig;
use crate::session::{ApiCredentials, AuthUser, SessionStore, UserDefaults};

use super::ErpError;
use super::conversions::{
    convert_item, convert_item_page, convert_quotation, convert_statement, convert_summary,
    line_input, modify_payload,
};
use super::methods;
use super::types::{
    CreateCartParams, Envelope, ErrorBody, ItemDoc, ItemPageDoc, ItemParams, LoginData,
    LoginParams, ModifyCartParams, PageParams, QuotationDoc, QuotationParams, QuotationSummaryDoc,
    SearchParams, ServerMessage, StatementDoc,
};

const BODY_LOG_LIMIT: usize = 500;

/// Client for the ERP's whitelisted RPC methods.
///
/// Authenticated calls read credentials from the [`SessionStore`] at call
/// time, so a login or logout takes effect on the next request.
#[derive(Clone)]
pub struct ErpClient {
    inner: Arc<ErpClientInner>,
}

struct ErpClientInner {
    client: reqwest::Client,
    default_base: Url,
    app: String,
    session: SessionStore,
}

impl std::fmt::Debug for ErpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpClient")
            .field("default_base", &self.inner.default_base.as_str())
            .field("app", &self.inner.app)
            .finish_non_exhaustive()
    }
}

impl ErpClient {
    /// Create a client for the configured ERP.
    #[must_use]
    pub fn new(config: &ErpConfig, session: SessionStore) -> Self {
        Self {
            inner: Arc::new(ErpClientInner {
                client: reqwest::Client::new(),
                default_base: normalize_base(config.base_url.clone()),
                app: config.api_app.clone(),
                session,
            }),
        }
    }

    /// The session this client reads credentials from.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    fn method_url(&self, base: &Url, method: &str) -> Result<Url, ErpError> {
        Ok(base.join(&format!("api/method/{}.{method}", self.inner.app))?)
    }

    /// Call an authenticated method, requiring a `data` payload.
    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, ErpError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| ErpError::InvalidData(format!("{method}: reply carried no data")))
    }

    /// Call an authenticated method. `Ok(None)` means success without data.
    async fn call_optional<P, T>(&self, method: &str, params: &P) -> Result<Option<T>, ErpError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let user = self
            .inner
            .session
            .current()
            .ok_or(ErpError::MissingCredentials)?;
        let base = user
            .company_url
            .clone()
            .map_or_else(|| self.inner.default_base.clone(), normalize_base);
        let url = self.method_url(&base, method)?;

        let mut request = self
            .inner
            .client
            .post(url)
            .header(AUTHORIZATION, user.credentials.authorization())
            .json(params);
        if let Some(sid) = user.credentials.sid() {
            request = request.header(COOKIE, format!("sid={sid}"));
        }

        let response = request.send().await?;
        read_reply(method, response).await
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Exchange email and password for API credentials.
    ///
    /// `tenant` overrides the configured base URL for this call. The returned
    /// user is not stored; pass it to [`SessionStore::login`].
    ///
    /// # Errors
    ///
    /// Returns [`ErpError::Unauthorized`] for rejected credentials, or
    /// another variant if the call fails.
    #[instrument(skip(self, email, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &str,
        tenant: Option<&Url>,
    ) -> Result<AuthUser, ErpError> {
        let base = tenant.cloned().map_or_else(|| self.inner.default_base.clone(), normalize_base);
        let url = self.method_url(&base, methods::LOGIN)?;

        let response = self
            .inner
            .client
            .post(url)
            .json(&LoginParams {
                usr: email.as_str(),
                pwd: password,
            })
            .send()
            .await?;

        let data: LoginData = read_reply(methods::LOGIN, response)
            .await?
            .ok_or_else(|| ErpError::InvalidData("login reply carried no data".to_string()))?;

        let user = auth_user(data, tenant)?;
        debug!(full_name = %user.full_name, "Login accepted");
        Ok(user)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Fetch one page of the catalog (pages start at 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn get_items(&self, page: u32, page_length: u32) -> Result<ItemPage, ErpError> {
        let doc: ItemPageDoc = self
            .call(methods::GET_ITEMS, &PageParams { page, page_length })
            .await?;
        Ok(convert_item_page(doc, page))
    }

    /// Full-text search over the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn search_items(
        &self,
        query: &str,
        page_length: u32,
    ) -> Result<Vec<CatalogItem>, ErpError> {
        let docs: Vec<ItemDoc> = self
            .call(methods::SEARCH_ITEMS, &SearchParams { query, page_length })
            .await?;
        Ok(docs.into_iter().map(convert_item).collect())
    }

    /// Fetch one item.
    ///
    /// # Errors
    ///
    /// Returns [`ErpError::NotFound`] if the ERP has no such item.
    #[instrument(skip(self, item_code), fields(item_code = %item_code))]
    pub async fn get_item(&self, item_code: &ItemCode) -> Result<CatalogItem, ErpError> {
        let doc: Option<ItemDoc> = self
            .call_optional(
                methods::GET_ITEM,
                &ItemParams {
                    item_code: item_code.as_str(),
                },
            )
            .await?;
        doc.map(convert_item)
            .ok_or_else(|| ErpError::NotFound(item_code.to_string()))
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// List the user's quotations, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or a row has an unknown status.
    #[instrument(skip(self))]
    pub async fn list_quotations(
        &self,
        page: u32,
        page_length: u32,
    ) -> Result<Vec<QuotationSummary>, ErpError> {
        let docs: Vec<QuotationSummaryDoc> = self
            .call(methods::LIST_QUOTATIONS, &PageParams { page, page_length })
            .await?;
        docs.into_iter().map(convert_summary).collect()
    }

    /// One page of the customer's account statement (pages start at 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    #[instrument(skip(self))]
    pub async fn get_statement(&self, page: u32, page_length: u32) -> Result<Statement, ErpError> {
        let doc: StatementDoc = self
            .call(methods::GET_STATEMENT, &PageParams { page, page_length })
            .await?;
        Ok(convert_statement(doc, page))
    }
}

// =============================================================================
// Quotations
// =============================================================================

impl QuotationApi for ErpClient {
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn create_cart(&self, lines: &[LineDraft]) -> Result<Quotation, ErpError> {
        let params = CreateCartParams {
            items: lines.iter().map(line_input).collect(),
        };
        let doc: QuotationDoc = self.call(methods::CREATE_CART, &params).await?;
        convert_quotation(doc)
    }

    #[instrument(skip(self, name), fields(quotation = %name))]
    async fn get_cart(&self, name: &QuotationName) -> Result<Quotation, ErpError> {
        let doc: QuotationDoc = self
            .call(
                methods::GET_CART,
                &QuotationParams {
                    quotation: name.as_str(),
                },
            )
            .await?;
        convert_quotation(doc)
    }

    #[instrument(skip(self, name, change), fields(quotation = %name))]
    async fn modify_cart(
        &self,
        name: &QuotationName,
        change: &CartChange,
    ) -> Result<Quotation, ErpError> {
        let (action, payload) = modify_payload(change);
        let doc: QuotationDoc = self
            .call(
                methods::MODIFY_CART,
                &ModifyCartParams {
                    quotation: name.as_str(),
                    action,
                    payload,
                },
            )
            .await?;
        convert_quotation(doc)
    }

    #[instrument(skip(self, name), fields(quotation = %name))]
    async fn submit_cart(&self, name: &QuotationName) -> Result<Quotation, ErpError> {
        let doc: QuotationDoc = self
            .call(
                methods::SUBMIT_CART,
                &QuotationParams {
                    quotation: name.as_str(),
                },
            )
            .await?;
        convert_quotation(doc)
    }
}

// =============================================================================
// Replies
// =============================================================================

async fn read_reply<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<Option<T>, ErpError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        warn!(method, retry_after, "ERP rate limited request");
        return Err(ErpError::RateLimited(retry_after));
    }

    let body = response.text().await?;

    if !status.is_success() {
        let err = map_failure(status, &body);
        if status.is_server_error() {
            error!(
                method,
                status = %status,
                body = %body.chars().take(BODY_LOG_LIMIT).collect::<String>(),
                "ERP returned server error"
            );
        } else {
            debug!(method, error = %err, "ERP rejected request");
        }
        return Err(err);
    }

    decode_reply(&body).inspect_err(|e| {
        if matches!(e, ErpError::Parse(_)) {
            error!(
                method,
                error = %e,
                body = %body.chars().take(BODY_LOG_LIMIT).collect::<String>(),
                "Failed to parse ERP reply"
            );
        }
    })
}

/// Unwrap the `{"message": {...}}` envelope of a 2xx reply.
fn decode_reply<T: DeserializeOwned>(body: &str) -> Result<Option<T>, ErpError> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    let reply = envelope.message;
    if !reply.success {
        return Err(ErpError::Application(
            reply
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "request failed".to_string()),
        ));
    }
    Ok(reply.data)
}

/// Map a non-2xx reply to an error.
fn map_failure(status: StatusCode, body: &str) -> ErpError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = failure_message(&parsed)
        .or_else(|| status.canonical_reason().map(str::to_owned))
        .unwrap_or_else(|| "unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErpError::Unauthorized(message),
        StatusCode::NOT_FOUND => ErpError::NotFound(message),
        _ => ErpError::Status { status, message },
    }
}

/// Best human-readable message in an error body.
///
/// Order: the first `_server_messages` entry, then `exception` without its
/// `module.ExcType: ` prefix, then `message` if it is a string.
fn failure_message(body: &ErrorBody) -> Option<String> {
    let from_server_messages = body.server_messages.as_deref().and_then(|raw| {
        let encoded: Vec<String> = serde_json::from_str(raw).ok()?;
        encoded
            .iter()
            .filter_map(|entry| serde_json::from_str::<ServerMessage>(entry).ok())
            .map(|m| m.message)
            .find(|m| !m.trim().is_empty())
    });

    from_server_messages
        .or_else(|| {
            body.exception.as_deref().map(|exc| {
                exc.split_once(": ")
                    .map_or(exc, |(_, message)| message)
                    .to_owned()
            })
        })
        .or_else(|| {
            body.message
                .as_ref()
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .filter(|m| !m.trim().is_empty())
}

fn auth_user(data: LoginData, tenant: Option<&Url>) -> Result<AuthUser, ErpError> {
    let email = Email::parse(&data.email)
        .map_err(|e| ErpError::InvalidData(format!("login email: {e}")))?;
    let company_url = match data.company_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(raw) => Some(normalize_base(Url::parse(raw)?)),
        None => tenant.cloned().map(normalize_base),
    };

    Ok(AuthUser {
        email,
        full_name: data.full_name,
        company_url,
        credentials: ApiCredentials::new(
            data.api_key,
            SecretString::from(data.api_secret),
            data.sid.filter(|s| !s.is_empty()).map(SecretString::from),
        ),
        defaults: UserDefaults {
            warehouse: data.default_warehouse.map(WarehouseName::new),
            currency: data.default_currency.as_deref().map(CurrencyCode::new),
            payment_terms: data.payment_terms,
        },
    })
}

/// Ensure the path ends in `/` so `join` appends instead of replacing.
pub(crate) fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
