//! Order placement state machine
//!
//! ```text
//! Idle --Submit--> Submitting --Route--> PreflightFetch --PreflightFetched--> Executing
//!   ^                  |                      |                    \
//!   |  (guard failed)  |                      | PreflightFailed     --> PriceConfirmPending
//!   +------------------+                      v                          | Confirm   | Decline
//!                                           Error                      Executing    Idle
//!
//! Executing --TradeCompleted--> Success | Error --Dismiss--> Idle
//!
//! Submitting | PreflightFetch | PriceConfirmPending --Cancel--> Idle
//! Executing --Cancel--> Error (outcome unknown)
//! ```
//!
//! [`transition`] is pure: it never touches the network or the clock. What
//! it needs to know about the world arrives in [`OrderContext`], and what
//! it wants done leaves as [`Effect`]s for the driver to perform.

use crate::domain::{OrderFailure, PriceChangeThresholds, Side, TradeIntent};
use crate::infrastructure::api::{ResponseStatus, TradeReceipt};

/// The stock an order panel is attached to
#[derive(Debug, Clone, PartialEq)]
pub struct StockContext {
    pub symbol: String,
    /// Last price shown to the user (live tick or REST snapshot)
    pub displayed_price: f64,
}

/// World state read by [`transition`]
#[derive(Debug, Clone, Copy)]
pub struct OrderContext<'a> {
    pub authenticated: bool,
    pub stock: Option<&'a StockContext>,
    /// Live tick for the stock, if one arrived since the last reconnect
    pub live_price: Option<f64>,
    pub market_open: bool,
    pub thresholds: PriceChangeThresholds,
}

impl OrderContext<'_> {
    /// Live tick if present, else what the user was shown
    fn effective_price(&self) -> Option<f64> {
        self.live_price
            .or_else(|| self.stock.map(|stock| stock.displayed_price))
    }
}

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderRequest {
    /// Signed so that negative input can be rejected rather than wrapped
    pub quantity: i64,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderState {
    /// Ready for input; `rejection` holds why the last submit never left
    Idle { rejection: Option<OrderFailure> },
    /// Guards passed, deciding whether a preflight check is needed
    Submitting { intent: TradeIntent },
    /// Waiting for the forced-live price
    PreflightFetch { intent: TradeIntent, displayed_price: f64 },
    /// Price moved; blocked until the user confirms or declines
    PriceConfirmPending {
        intent: TradeIntent,
        displayed_price: f64,
        fetched_price: f64,
    },
    /// Trade request in flight
    Executing { intent: TradeIntent },
    /// `pending` means queued for the next session
    Success {
        intent: TradeIntent,
        pending: bool,
        message: String,
    },
    Error { failure: OrderFailure },
}

impl Default for OrderState {
    fn default() -> Self {
        OrderState::Idle { rejection: None }
    }
}

impl OrderState {
    pub fn name(&self) -> &'static str {
        match self {
            OrderState::Idle { .. } => "idle",
            OrderState::Submitting { .. } => "submitting",
            OrderState::PreflightFetch { .. } => "preflight_fetch",
            OrderState::PriceConfirmPending { .. } => "price_confirm_pending",
            OrderState::Executing { .. } => "executing",
            OrderState::Success { .. } => "success",
            OrderState::Error { .. } => "error",
        }
    }

    /// A submission is between Submit and its outcome
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            OrderState::Submitting { .. }
                | OrderState::PreflightFetch { .. }
                | OrderState::PriceConfirmPending { .. }
                | OrderState::Executing { .. }
        )
    }

    /// Message to show the user, if any
    pub fn message(&self) -> Option<String> {
        match self {
            OrderState::Idle { rejection } => rejection.as_ref().map(ToString::to_string),
            OrderState::PriceConfirmPending {
                displayed_price,
                fetched_price,
                ..
            } => Some(format!(
                "Price changed from Rs {:.2} to Rs {:.2}. Continue?",
                displayed_price, fetched_price
            )),
            OrderState::Success { message, .. } => Some(message.clone()),
            OrderState::Error { failure } => Some(failure.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Submit(OrderRequest),
    /// Decide between preflight and direct execution
    Route,
    PreflightFetched { price: f64 },
    PreflightFailed { reason: String },
    Confirm,
    Decline,
    /// The trade endpoint answered with an envelope
    TradeCompleted(TradeReceipt),
    /// The trade request failed or the answer was not an envelope
    TradeFailed { reason: String },
    Dismiss,
    /// Abandon the step in progress, e.g. the caller stopped waiting
    Cancel,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Forced-live, cache-bypassing price fetch
    FetchLivePrice { symbol: String },
    ExecuteTrade(TradeIntent),
    RedirectToLogin,
    /// Clear transient form fields (quantity)
    ClearForm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: OrderState,
    pub effects: Vec<Effect>,
    /// False when the event does not apply to the state; `state` is unchanged
    pub applied: bool,
}

impl Transition {
    fn to(state: OrderState) -> Self {
        Self {
            state,
            effects: Vec::new(),
            applied: true,
        }
    }

    fn with(state: OrderState, effect: Effect) -> Self {
        Self {
            state,
            effects: vec![effect],
            applied: true,
        }
    }

    fn ignored(state: &OrderState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
            applied: false,
        }
    }

    fn rejected(failure: OrderFailure) -> Self {
        Self::to(OrderState::Idle {
            rejection: Some(failure),
        })
    }
}

const UNKNOWN_TRADE_OUTCOME: &str = "Order status unknown, check your orders before retrying";

/// Compute the next state and the effects to perform
pub fn transition(state: &OrderState, event: OrderEvent, ctx: &OrderContext<'_>) -> Transition {
    use OrderEvent as E;
    use OrderState as S;

    match (state, event) {
        (S::Idle { .. }, E::Submit(request)) => submit(request, ctx),

        (S::Submitting { intent }, E::Route) => route(intent, ctx),

        (
            S::PreflightFetch {
                intent,
                displayed_price,
            },
            E::PreflightFetched { price },
        ) => {
            if !(price.is_finite() && price > 0.0) {
                return Transition::to(S::Error {
                    failure: OrderFailure::PreflightUnavailable(format!(
                        "invalid live price {}",
                        price
                    )),
                });
            }

            let repriced = intent.at_price(price);
            if ctx.thresholds.is_material(*displayed_price, price) {
                Transition::to(S::PriceConfirmPending {
                    intent: repriced,
                    displayed_price: *displayed_price,
                    fetched_price: price,
                })
            } else {
                execute(repriced)
            }
        }

        (S::PreflightFetch { .. }, E::PreflightFailed { reason }) => Transition::to(S::Error {
            failure: OrderFailure::PreflightUnavailable(reason),
        }),

        (S::PriceConfirmPending { intent, .. }, E::Confirm) => execute(intent.clone()),

        (S::PriceConfirmPending { .. }, E::Decline) => Transition::to(S::default()),

        (S::Executing { intent }, E::TradeCompleted(receipt)) => match receipt.status {
            ResponseStatus::Success | ResponseStatus::Pending => {
                let pending = receipt.status == ResponseStatus::Pending;
                let message = receipt
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| default_success_message(intent, pending));
                Transition::with(
                    S::Success {
                        intent: intent.clone(),
                        pending,
                        message,
                    },
                    Effect::ClearForm,
                )
            }
            ResponseStatus::Error => Transition::to(S::Error {
                failure: OrderFailure::server(receipt.message.as_deref()),
            }),
        },

        (S::Executing { .. }, E::TradeFailed { .. }) => Transition::to(S::Error {
            failure: OrderFailure::server(None),
        }),

        (S::Success { .. } | S::Error { .. }, E::Dismiss) => Transition::to(S::default()),

        // Nothing has been sent yet
        (
            S::Submitting { .. } | S::PreflightFetch { .. } | S::PriceConfirmPending { .. },
            E::Cancel,
        ) => Transition::to(S::default()),

        // The request may have reached the server
        (S::Executing { .. }, E::Cancel) => Transition::to(S::Error {
            failure: OrderFailure::server(Some(UNKNOWN_TRADE_OUTCOME)),
        }),

        // A new submit from a finished state starts over
        (S::Success { .. } | S::Error { .. }, E::Submit(request)) => submit(request, ctx),

        (state, _) => Transition::ignored(state),
    }
}

fn submit(request: OrderRequest, ctx: &OrderContext<'_>) -> Transition {
    let quantity = match u32::try_from(request.quantity) {
        Ok(q) if q > 0 => q,
        _ => {
            return Transition::rejected(OrderFailure::Validation(
                "Quantity must be greater than zero".to_string(),
            ))
        }
    };

    if !ctx.authenticated {
        return Transition {
            state: OrderState::Idle {
                rejection: Some(OrderFailure::AuthMissing),
            },
            effects: vec![Effect::RedirectToLogin],
            applied: true,
        };
    }

    let (Some(stock), Some(price)) = (ctx.stock, ctx.effective_price()) else {
        return Transition::rejected(OrderFailure::Validation(
            "No stock selected".to_string(),
        ));
    };

    Transition::to(OrderState::Submitting {
        intent: TradeIntent {
            stock_name: stock.symbol.clone(),
            intended_price: price,
            quantity,
            side: request.side,
        },
    })
}

fn route(intent: &TradeIntent, ctx: &OrderContext<'_>) -> Transition {
    if !ctx.market_open {
        // Queued for the next session at the price the user saw
        return execute(intent.clone());
    }

    match ctx.live_price {
        Some(live) => execute(intent.at_price(live)),
        None => Transition::with(
            OrderState::PreflightFetch {
                intent: intent.clone(),
                displayed_price: intent.intended_price,
            },
            Effect::FetchLivePrice {
                symbol: intent.stock_name.clone(),
            },
        ),
    }
}

fn execute(intent: TradeIntent) -> Transition {
    Transition::with(
        OrderState::Executing {
            intent: intent.clone(),
        },
        Effect::ExecuteTrade(intent),
    )
}

fn default_success_message(intent: &TradeIntent, pending: bool) -> String {
    if pending {
        format!(
            "{} order for {} x {} queued for the next market open",
            intent.side, intent.quantity, intent.stock_name
        )
    } else {
        format!(
            "{} {} x {} at Rs {:.2}",
            intent.side, intent.quantity, intent.stock_name, intent.intended_price
        )
    }
}
