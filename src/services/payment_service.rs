use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{CallbackAck, InitiatePaymentRequest, StkCallbackEnvelope},
    entity::{
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, OrderStatus,
        },
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments, PaymentMethod,
            PaymentStatus,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Payment,
    mpesa,
    response::{ApiResponse, Meta},
    services::notification_service,
    state::AppState,
};

/// Fire the STK Push for an order's M-Pesa payment. The push only prompts the
/// phone; completion or failure arrives on the webhook callback.
pub async fn initiate_mpesa(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: InitiatePaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(order_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::BadRequest("Order is not awaiting payment".into()));
    }

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_desc(PaymentCol::CreatedAt)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if payment.payment_method != PaymentMethod::Mpesa {
        return Err(AppError::BadRequest(
            "Order is not payable via M-Pesa".into(),
        ));
    }
    if !matches!(
        payment.status,
        PaymentStatus::Pending | PaymentStatus::Failed
    ) {
        return Err(AppError::BadRequest(
            "Payment has already been initiated".into(),
        ));
    }

    let phone = mpesa::normalize_phone(&payload.phone_number)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let push = state
        .mpesa
        .stk_push(&phone, payment.amount, &order.order_number)
        .await;

    let push = match push {
        Ok(resp) => resp,
        Err(err) => {
            // Keep the failure on the payment record; the user can retry.
            tracing::error!(error = %err, order_id = %order.id, "stk push failed");
            let mut active: PaymentActive = payment.into();
            active.status = Set(PaymentStatus::Failed);
            active.failure_reason = Set(Some(err.to_string()));
            active.update(&state.orm).await?;
            return Err(err.into());
        }
    };

    let mut active: PaymentActive = payment.into();
    active.status = Set(PaymentStatus::Processing);
    active.mpesa_phone = Set(Some(phone));
    active.merchant_request_id = Set(Some(push.merchant_request_id.clone()));
    active.checkout_request_id = Set(Some(push.checkout_request_id.clone()));
    active.response_data = Set(serde_json::to_value(&push).ok());
    let payment = active.update(&state.orm).await?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_initiate",
        Some("payments"),
        Some(serde_json::json!({
            "order_id": order.id,
            "checkout_request_id": push.checkout_request_id
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "STK push sent, check your phone",
        payment.into(),
        Some(Meta::empty()),
    ))
}

/// Daraja callback receiver. Always acknowledges so the gateway stops
/// re-posting; an unknown or already-completed payment is logged and ignored.
pub async fn handle_callback(
    state: &AppState,
    envelope: StkCallbackEnvelope,
) -> AppResult<CallbackAck> {
    let callback = envelope.body.stk_callback;

    let payment = Payments::find()
        .filter(PaymentCol::CheckoutRequestId.eq(callback.checkout_request_id.as_str()))
        .one(&state.orm)
        .await?;

    let Some(payment) = payment else {
        tracing::warn!(
            checkout_request_id = %callback.checkout_request_id,
            "callback for unknown payment"
        );
        return Ok(CallbackAck::accepted());
    };

    if payment.status == PaymentStatus::Completed {
        return Ok(CallbackAck::accepted());
    }

    let order = Orders::find_by_id(payment.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let user_id = order.user_id;
    let order_number = order.order_number.clone();

    let txn = state.orm.begin().await?;

    if callback.result_code == 0 {
        let receipt = callback.metadata_str("MpesaReceiptNumber");
        let phone = callback.metadata_str("PhoneNumber");

        let mut active: PaymentActive = payment.into();
        active.status = Set(PaymentStatus::Completed);
        active.mpesa_receipt = Set(receipt);
        if phone.is_some() {
            active.mpesa_phone = Set(phone);
        }
        active.completed_at = Set(Some(Utc::now().into()));
        active.update(&txn).await?;

        // Payment success is what confirms the order.
        if order.status == OrderStatus::Pending {
            let mut order_active: OrderActive = order.into();
            order_active.status = Set(OrderStatus::Confirmed);
            order_active.confirmed_at = Set(Some(Utc::now().into()));
            order_active.updated_at = Set(Utc::now().into());
            order_active.update(&txn).await?;
        }

        txn.commit().await?;

        notification_service::notify(
            &state.pool,
            user_id,
            "payment",
            "Payment received",
            &format!("Payment for order {order_number} was received."),
            None,
        )
        .await;
    } else {
        // Failure leaves the order pending so the user can retry the push.
        let mut active: PaymentActive = payment.into();
        active.status = Set(PaymentStatus::Failed);
        active.failure_reason = Set(Some(callback.result_desc.clone()));
        active.update(&txn).await?;

        txn.commit().await?;

        tracing::warn!(
            result_code = callback.result_code,
            result_desc = %callback.result_desc,
            "stk push rejected"
        );

        notification_service::notify(
            &state.pool,
            user_id,
            "payment",
            "Payment failed",
            &format!(
                "Payment for order {order_number} failed: {}",
                callback.result_desc
            ),
            None,
        )
        .await;
    }

    Ok(CallbackAck::accepted())
}

pub async fn payment_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(order_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_desc(PaymentCol::CreatedAt)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success(
        "Payment status",
        payment.into(),
        Some(Meta::empty()),
    ))
}
