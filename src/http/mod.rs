use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::{AppError, AuthSession, TradeReceipt, TradingService};
use crate::domain::{Cents, User, format_usd};

/// Header carrying the session token on authenticated routes.
pub const SESSION_HEADER: &str = "X-Session-Token";

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        if !self.is_client_error() {
            // Internal detail stays in the log, not on the wire.
            log::error!("internal error: {:#}", self);
            return HttpResponse::InternalServerError().json(ErrorBody {
                kind: self.kind(),
                message: "internal server error".into(),
            });
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        })
    }
}

/// Register every route on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
        .service(login)
        .service(logout)
        .service(quote)
        .service(buy)
        .service(sell)
        .service(deposit)
        .service(portfolio)
        .service(history);
}

fn session_token(req: &HttpRequest) -> Option<&str> {
    req.headers().get(SESSION_HEADER)?.to_str().ok()
}

async fn current_user(
    service: &TradingService,
    req: &HttpRequest,
) -> Result<User, AppError> {
    let token = session_token(req).ok_or(AppError::NotAuthenticated)?;
    service.authenticate(token).await
}

// ========================
// Accounts
// ========================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirmation: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub username: String,
    pub token: String,
    pub cash_cents: Cents,
    pub cash: String,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user_id: session.user.id.to_string(),
            username: session.user.username,
            token: session.token,
            cash_cents: session.user.cash_cents,
            cash: format_usd(session.user.cash_cents),
        }
    }
}

#[post("/register")]
pub async fn register(
    service: web::Data<TradingService>,
    body: web::Json<RegisterRequest>,
) -> Result<web::Json<SessionResponse>, AppError> {
    let session = service
        .register(&body.username, &body.password, &body.confirmation)
        .await?;
    log::info!("registered user {}", session.user.username);
    Ok(web::Json(session.into()))
}

#[post("/login")]
pub async fn login(
    service: web::Data<TradingService>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> Result<web::Json<SessionResponse>, AppError> {
    let session = service
        .login(&body.username, &body.password, session_token(&req))
        .await?;
    Ok(web::Json(session.into()))
}

#[post("/logout")]
pub async fn logout(
    service: web::Data<TradingService>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    if let Some(token) = session_token(&req) {
        service.logout(token).await?;
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({})))
}

// ========================
// Market
// ========================

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub name: String,
    pub price_cents: Cents,
    pub price: String,
}

#[get("/quote/{symbol}")]
pub async fn quote(
    service: web::Data<TradingService>,
    req: HttpRequest,
    path: web::Path<(String,)>,
) -> Result<web::Json<QuoteResponse>, AppError> {
    current_user(&service, &req).await?;
    let (symbol,) = path.into_inner();
    let quote = service.quote(&symbol).await?;
    Ok(web::Json(QuoteResponse {
        symbol: quote.symbol,
        name: quote.name,
        price_cents: quote.price_cents,
        price: format_usd(quote.price_cents),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub shares: i64,
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub symbol: String,
    pub shares: i64,
    pub unit_price_cents: Cents,
    pub unit_price: String,
    pub total_cents: Cents,
    pub total: String,
    pub cash_cents: Cents,
    pub cash: String,
}

impl From<TradeReceipt> for TradeResponse {
    fn from(receipt: TradeReceipt) -> Self {
        Self {
            symbol: receipt.symbol,
            shares: receipt.shares,
            unit_price_cents: receipt.unit_price_cents,
            unit_price: format_usd(receipt.unit_price_cents),
            total_cents: receipt.total_cents,
            total: format_usd(receipt.total_cents),
            cash_cents: receipt.cash_after,
            cash: format_usd(receipt.cash_after),
        }
    }
}

#[post("/buy")]
pub async fn buy(
    service: web::Data<TradingService>,
    req: HttpRequest,
    body: web::Json<TradeRequest>,
) -> Result<web::Json<TradeResponse>, AppError> {
    let user = current_user(&service, &req).await?;
    let receipt = service.buy(user.id, &body.symbol, body.shares).await?;
    Ok(web::Json(receipt.into()))
}

#[post("/sell")]
pub async fn sell(
    service: web::Data<TradingService>,
    req: HttpRequest,
    body: web::Json<TradeRequest>,
) -> Result<web::Json<TradeResponse>, AppError> {
    let user = current_user(&service, &req).await?;
    let receipt = service.sell(user.id, &body.symbol, body.shares).await?;
    Ok(web::Json(receipt.into()))
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    /// Decimal string, e.g. "100.00"; floating point never touches money.
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct CashResponse {
    pub cash_cents: Cents,
    pub cash: String,
}

#[post("/deposit")]
pub async fn deposit(
    service: web::Data<TradingService>,
    req: HttpRequest,
    body: web::Json<DepositRequest>,
) -> Result<web::Json<CashResponse>, AppError> {
    let user = current_user(&service, &req).await?;
    let cash_after = service.deposit(user.id, &body.amount).await?;
    Ok(web::Json(CashResponse {
        cash_cents: cash_after,
        cash: format_usd(cash_after),
    }))
}

// ========================
// Views
// ========================

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    pub symbol: String,
    pub shares: i64,
    pub name: Option<String>,
    pub unit_price_cents: Option<Cents>,
    pub unit_price: Option<String>,
    pub market_value_cents: Option<Cents>,
    pub market_value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub cash_cents: Cents,
    pub cash: String,
    pub positions: Vec<PositionResponse>,
    pub total_cents: Option<Cents>,
    pub total: Option<String>,
}

#[get("/")]
pub async fn portfolio(
    service: web::Data<TradingService>,
    req: HttpRequest,
) -> Result<web::Json<PortfolioResponse>, AppError> {
    let user = current_user(&service, &req).await?;
    let view = service.portfolio(user.id).await?;

    let positions = view
        .positions
        .into_iter()
        .map(|p| PositionResponse {
            symbol: p.symbol,
            shares: p.shares,
            name: p.name,
            unit_price_cents: p.unit_price_cents,
            unit_price: p.unit_price_cents.map(format_usd),
            market_value_cents: p.market_value_cents,
            market_value: p.market_value_cents.map(format_usd),
        })
        .collect();

    Ok(web::Json(PortfolioResponse {
        cash_cents: view.cash_cents,
        cash: format_usd(view.cash_cents),
        positions,
        total_cents: view.total_cents,
        total: view.total_cents.map(format_usd),
    }))
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryResponse {
    pub kind: String,
    pub symbol: String,
    pub name: Option<String>,
    pub share_delta: i64,
    pub unit_price_cents: Cents,
    pub unit_price: String,
    pub total_cents: Cents,
    pub total: String,
    pub recorded_at: DateTime<Utc>,
}

#[get("/history")]
pub async fn history(
    service: web::Data<TradingService>,
    req: HttpRequest,
) -> Result<web::Json<Vec<HistoryEntryResponse>>, AppError> {
    let user = current_user(&service, &req).await?;
    let rows = service.history(user.id).await?;

    let entries = rows
        .into_iter()
        .map(|row| HistoryEntryResponse {
            kind: row.entry.kind.to_string(),
            symbol: row.entry.symbol,
            name: row.name,
            share_delta: row.entry.share_delta,
            unit_price_cents: row.entry.unit_price_cents,
            unit_price: format_usd(row.entry.unit_price_cents),
            total_cents: row.entry.total_cents,
            total: format_usd(row.entry.total_cents),
            recorded_at: row.entry.recorded_at,
        })
        .collect();

    Ok(web::Json(entries))
}
