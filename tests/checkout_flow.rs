use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use storefront_orders::checkout::{Checkout, CheckoutError, CheckoutForm, OrderSubmitter, SubmissionError};
use storefront_orders::config::AppConfig;
use storefront_orders::domain::{CartStore, Money, OrderId, OrderPayload, Product, ShippingPolicy, ValidationError};
use storefront_orders::notify::LogPublisher;
use storefront_orders::orders::OrderService;
use storefront_orders::storage::{InMemoryStore, OrderRepository};

fn form() -> CheckoutForm {
    CheckoutForm {
        customer_name: "Noa Levi".into(),
        customer_email: "noa@example.com".into(),
        customer_phone: "050-1234567".into(),
        shipping_address: "12 Herzl St".into(),
        city: "Haifa".into(),
        payment_method: "bank_transfer".into(),
        ..Default::default()
    }
}

fn catalog() -> (Product, Product) {
    (
        Product::new("Camera", Money::from_major(100), 5),
        Product::new("Sensor", Money::from_major(50), 5).with_sale_price(Money::from_major(30)),
    )
}

fn cart_with(camera: &Product, sensor: &Product) -> CartStore {
    let cart = CartStore::new();
    cart.add_item(camera, 2).unwrap();
    cart.add_item(sensor, 1).unwrap();
    cart
}

/// Counts calls and answers with a fresh id after an optional delay.
#[derive(Default)]
struct CountingSubmitter {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingSubmitter {
    fn slow(delay: Duration) -> Self { Self { calls: AtomicUsize::new(0), delay } }
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl OrderSubmitter for CountingSubmitter {
    async fn create_order(&self, _payload: OrderPayload) -> Result<OrderId, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(OrderId::new())
    }
}

struct FailingSubmitter;

#[async_trait]
impl OrderSubmitter for FailingSubmitter {
    async fn create_order(&self, _payload: OrderPayload) -> Result<OrderId, SubmissionError> {
        Err(SubmissionError::Unavailable("connection reset".into()))
    }
}

/// Persists through the real service but loses the acknowledgement.
struct LostAck(Arc<OrderService>);

#[async_trait]
impl OrderSubmitter for LostAck {
    async fn create_order(&self, payload: OrderPayload) -> Result<OrderId, SubmissionError> {
        self.0.create_order(payload).await.map_err(|e| SubmissionError::Unavailable(e.to_string()))?;
        Err(SubmissionError::Unavailable("response lost".into()))
    }
}

fn service_over(camera: &Product, sensor: &Product) -> (Arc<InMemoryStore>, Arc<OrderService>) {
    let store = Arc::new(InMemoryStore::with_catalog([camera.clone(), sensor.clone()], Vec::new()));
    let service = Arc::new(OrderService::new(store.clone(), Arc::new(LogPublisher), ShippingPolicy::default()));
    (store, service)
}

#[tokio::test]
async fn places_order_and_clears_cart() {
    let (camera, sensor) = catalog();
    let (store, service) = service_over(&camera, &sensor);
    let checkout = Checkout::new(service, ShippingPolicy::default());
    let cart = cart_with(&camera, &sensor);

    let receipt = checkout.place_order(&cart, &form()).await.unwrap();
    assert_eq!(receipt.total, Money::from_major(280));
    assert_eq!(receipt.customer_email, "noa@example.com");
    assert!(!receipt.cart_changed);
    assert!(cart.is_empty());

    let stored = store.find_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(stored.subtotal(), Money::from_major(230));
    assert_eq!(stored.shipping_cost(), Money::from_major(50));
    assert_eq!(stored.payment_method().as_str(), "bank_transfer");
}

#[tokio::test]
async fn empty_cart_is_refused_before_submitting() {
    let submitter = Arc::new(CountingSubmitter::default());
    let checkout = Checkout::new(submitter.clone(), ShippingPolicy::default());
    let err = checkout.place_order(&CartStore::new(), &form()).await.unwrap_err();
    assert_eq!(err, CheckoutError::EmptyCart);
    assert_eq!(submitter.calls(), 0);
}

#[tokio::test]
async fn invalid_form_is_refused_before_submitting() {
    let (camera, sensor) = catalog();
    let submitter = Arc::new(CountingSubmitter::default());
    let checkout = Checkout::new(submitter.clone(), ShippingPolicy::default());
    let mut f = form();
    f.customer_email = String::new();
    let err = checkout.place_order(&cart_with(&camera, &sensor), &f).await.unwrap_err();
    assert_eq!(err, CheckoutError::Validation(ValidationError::missing("customer_email")));
    assert_eq!(submitter.calls(), 0);
}

#[tokio::test]
async fn failed_submission_keeps_cart() {
    let (camera, sensor) = catalog();
    let checkout = Checkout::new(Arc::new(FailingSubmitter), ShippingPolicy::default());
    let cart = cart_with(&camera, &sensor);
    let before = cart.snapshot();

    let err = checkout.place_order(&cart, &form()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Submission(SubmissionError::Unavailable(_))));
    assert_eq!(cart.snapshot(), before);
}

#[tokio::test]
async fn timeout_keeps_cart() {
    let (camera, sensor) = catalog();
    let checkout = Checkout::new(Arc::new(CountingSubmitter::slow(Duration::from_millis(500))), ShippingPolicy::default())
        .with_timeout(Duration::from_millis(20));
    let cart = cart_with(&camera, &sensor);

    let err = checkout.place_order(&cart, &form()).await.unwrap_err();
    assert_eq!(err, CheckoutError::Submission(SubmissionError::Timeout));
    assert_eq!(cart.total_quantity(), 3);
}

#[tokio::test]
async fn second_submission_while_in_flight_is_rejected() {
    let (camera, sensor) = catalog();
    let submitter = Arc::new(CountingSubmitter::slow(Duration::from_millis(100)));
    let checkout = Checkout::new(submitter.clone(), ShippingPolicy::default());
    let cart = cart_with(&camera, &sensor);

    let second = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        // The cart stays editable while the first submission is pending.
        cart.increment(sensor.id);
        checkout.place_order(&cart, &form()).await
    };
    let first_form = form();
    let (first, second) = tokio::join!(checkout.place_order(&cart, &first_form), second);

    let receipt = first.unwrap();
    assert!(receipt.cart_changed);
    assert_eq!(second.unwrap_err(), CheckoutError::Submission(SubmissionError::InFlight));
    assert_eq!(submitter.calls(), 1);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn retry_after_lost_acknowledgement_reuses_order() {
    let (camera, sensor) = catalog();
    let (store, service) = service_over(&camera, &sensor);
    let cart = cart_with(&camera, &sensor);

    let flaky = Checkout::new(Arc::new(LostAck(service.clone())), ShippingPolicy::default());
    assert!(flaky.place_order(&cart, &form()).await.is_err());
    assert_eq!(cart.total_quantity(), 3);

    let checkout = Checkout::new(service, ShippingPolicy::default());
    let receipt = checkout.place_order(&cart, &form()).await.unwrap();
    assert_eq!(store.order_count().await, 1);
    let stored = store.list_orders().await.unwrap();
    assert_eq!(stored[0].id(), receipt.order_id);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn quote_reports_spend_left_for_free_shipping() {
    let (camera, sensor) = catalog();
    let checkout = Checkout::new(Arc::new(CountingSubmitter::default()), ShippingPolicy::default());
    let cart = cart_with(&camera, &sensor);
    assert_eq!(checkout.quote(&cart).unwrap().remaining_for_free_shipping, Some(Money::from_major(270)));

    cart.update_quantity(camera.id, 5);
    let quote = checkout.quote(&cart).unwrap();
    assert_eq!(quote.subtotal, Money::from_major(530));
    assert_eq!(quote.shipping_cost, Money::ZERO);
    assert_eq!(quote.remaining_for_free_shipping, None);
}

#[tokio::test]
async fn checkout_uses_configured_pricing() {
    let config = AppConfig::from_lookup(|key| match key {
        "ADMIN_API_TOKEN" => Some("t".into()),
        "FREE_SHIPPING_THRESHOLD" => Some("200".into()),
        _ => None,
    })
    .unwrap();
    let (camera, sensor) = catalog();
    let checkout = Checkout::from_config(Arc::new(CountingSubmitter::default()), &config);
    let receipt = checkout.place_order(&cart_with(&camera, &sensor), &form()).await.unwrap();
    assert_eq!(receipt.total, Money::from_major(230));
}
