// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The customer's cart: restaurant, contract choice, items, delivery point.
//!
//! Like registration this is a synchronous state machine. Steps that need
//! the store (sold-out items, contract lookup) are surfaced as
//! [`DraftReply::RestaurantChosen`] and completed by the caller.

use dormbite_config::model::{DormbiteConfig, MenuItem, RestaurantConfig};
use dormbite_core::types::{GeoPoint, KeyButton, Markup, NewOrder, OrderType, UserId};
use rand::Rng;

pub const ADD_ANOTHER: &str = "➕ Add another";
pub const REMOVE_LAST: &str = "➖ Remove last";
pub const DONE: &str = "✅ Done";
pub const CANCEL: &str = "❌ Cancel";
pub const CONTRACT: &str = "📄 Contract";
pub const REGULAR: &str = "💵 Regular";
pub const MY_DORM: &str = "🏠 My dorm";
pub const SHARE_LOCATION: &str = "📍 Share location";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStep {
    Restaurant,
    /// Contract or regular, only asked when a contract exists.
    Kind,
    Item,
    Review,
    Location,
    /// A shared pin is waiting for the dispatcher's verdict.
    AwaitingPin { pin: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftReply {
    Prompt { text: String, markup: Markup },
    /// The input names this restaurant; look up availability and call
    /// [`OrderDraft::select_restaurant`].
    RestaurantChosen(String),
    Cancelled { text: String },
    /// Deliver to the registered block.
    PlaceAtDorm,
    /// Customer shared a pin that the dispatcher must verify.
    VerifyPin(GeoPoint),
}

/// An order being assembled by one customer.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    customer: UserId,
    step: DraftStep,
    restaurant: Option<String>,
    pickup: Option<GeoPoint>,
    order_type: OrderType,
    available: Vec<MenuItem>,
    items: Vec<MenuItem>,
}

impl OrderDraft {
    pub fn new(customer: UserId, config: &DormbiteConfig) -> (Self, DraftReply) {
        let draft = Self {
            customer,
            step: DraftStep::Restaurant,
            restaurant: None,
            pickup: None,
            order_type: OrderType::Regular,
            available: Vec::new(),
            items: Vec::new(),
        };
        let reply = draft.restaurant_prompt(config, None);
        (draft, reply)
    }

    pub fn step(&self) -> DraftStep {
        self.step
    }

    pub fn customer(&self) -> UserId {
        self.customer
    }

    pub fn restaurant(&self) -> Option<&str> {
        self.restaurant.as_deref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Feeds a text reply into the cart.
    pub fn handle_text(&mut self, input: &str, config: &DormbiteConfig) -> DraftReply {
        let input = input.trim();
        let fee = config.dispatch.delivery_fee_per_item;
        let currency = config.dispatch.currency.as_str();

        if input == CANCEL || input.eq_ignore_ascii_case("cancel") {
            return DraftReply::Cancelled {
                text: "Order cancelled.".to_string(),
            };
        }

        match self.step {
            DraftStep::Restaurant => match config
                .restaurants
                .iter()
                .find(|r| r.label() == input || r.name == input)
            {
                Some(r) => DraftReply::RestaurantChosen(r.name.clone()),
                None => self.restaurant_prompt(config, Some("Please select a valid restaurant.")),
            },
            DraftStep::Kind => {
                self.order_type = match input {
                    CONTRACT => OrderType::Contract,
                    REGULAR => OrderType::Regular,
                    _ => return self.kind_prompt(Some("Please use the buttons.")),
                };
                self.step = DraftStep::Item;
                self.item_prompt(currency, None)
            }
            DraftStep::Item => match self.available.iter().find(|i| item_label(i, currency) == input) {
                Some(item) => {
                    self.items.push(item.clone());
                    self.step = DraftStep::Review;
                    self.review_prompt(fee, currency)
                }
                None => self.item_prompt(
                    currency,
                    Some("⚠️ Finish the process you started! Please select a food item from the buttons."),
                ),
            },
            DraftStep::Review => match input {
                ADD_ANOTHER => {
                    self.step = DraftStep::Item;
                    self.item_prompt(currency, None)
                }
                REMOVE_LAST => {
                    self.items.pop();
                    if self.items.is_empty() {
                        self.step = DraftStep::Item;
                        self.item_prompt(currency, Some("Your cart is empty."))
                    } else {
                        self.review_prompt(fee, currency)
                    }
                }
                DONE => {
                    self.step = DraftStep::Location;
                    self.location_prompt(None)
                }
                _ => self.review_prompt(fee, currency),
            },
            DraftStep::Location => match input {
                MY_DORM => DraftReply::PlaceAtDorm,
                _ => self.location_prompt(Some(
                    "Tap 📍 to share your location pin, or choose your dorm.",
                )),
            },
            DraftStep::AwaitingPin { .. } => DraftReply::Prompt {
                text: "Your location is waiting for dispatcher verification.".to_string(),
                markup: Markup::Keyboard(vec![vec![KeyButton::text(CANCEL)]]),
            },
        }
    }

    /// Feeds a shared location into the cart. Ignored outside the location step.
    pub fn handle_location(&mut self, point: GeoPoint) -> Option<DraftReply> {
        (self.step == DraftStep::Location).then_some(DraftReply::VerifyPin(point))
    }

    /// Completes the restaurant step once availability is known.
    pub fn select_restaurant(
        &mut self,
        restaurant: &RestaurantConfig,
        sold_out: &[String],
        has_contract: bool,
        currency: &str,
    ) -> DraftReply {
        self.restaurant = Some(restaurant.name.clone());
        self.pickup = Some(restaurant.location());
        self.available = restaurant
            .menu
            .iter()
            .filter(|item| !sold_out.contains(&item.name))
            .cloned()
            .collect();
        self.items.clear();
        self.order_type = OrderType::Regular;

        if self.available.is_empty() {
            self.step = DraftStep::Restaurant;
            return DraftReply::Cancelled {
                text: format!("Everything at {} is sold out right now.", restaurant.name),
            };
        }
        if has_contract {
            self.step = DraftStep::Kind;
            return self.kind_prompt(None);
        }
        self.step = DraftStep::Item;
        self.item_prompt(currency, None)
    }

    pub fn await_pin(&mut self, pin: u64) {
        self.step = DraftStep::AwaitingPin { pin };
    }

    /// Returns to the location step after the dispatcher rejected a pin.
    pub fn reject_pin(&mut self) -> DraftReply {
        self.step = DraftStep::Location;
        self.location_prompt(Some(
            "❌ Your location was rejected by the dispatcher. Share a different location or choose your dorm.",
        ))
    }

    pub fn total(&self, fee_per_item: f64) -> f64 {
        cart_total(&self.items, fee_per_item)
    }

    /// Builds the store row for this cart.
    pub fn to_new_order(
        &self,
        delivery: Option<GeoPoint>,
        fee_per_item: f64,
        verification_code: String,
        is_test: bool,
    ) -> NewOrder {
        NewOrder {
            customer_id: self.customer,
            restaurant: self.restaurant.clone().unwrap_or_default(),
            items: cart_summary(&self.items),
            total_price: self.total(fee_per_item),
            verification_code,
            delivery,
            pickup: self.pickup,
            order_type: self.order_type,
            is_test,
        }
    }

    fn restaurant_prompt(&self, config: &DormbiteConfig, note: Option<&str>) -> DraftReply {
        let mut rows: Vec<Vec<KeyButton>> = config
            .restaurants
            .chunks(2)
            .map(|pair| pair.iter().map(|r| KeyButton::text(r.label())).collect())
            .collect();
        rows.push(vec![KeyButton::text(CANCEL)]);
        DraftReply::Prompt {
            text: with_note(note, "Choose a restaurant:"),
            markup: Markup::Keyboard(rows),
        }
    }

    fn kind_prompt(&self, note: Option<&str>) -> DraftReply {
        DraftReply::Prompt {
            text: with_note(note, "You have a contract here. Order on contract or pay regularly?"),
            markup: Markup::Keyboard(vec![
                vec![KeyButton::text(CONTRACT), KeyButton::text(REGULAR)],
                vec![KeyButton::text(CANCEL)],
            ]),
        }
    }

    fn item_prompt(&self, currency: &str, note: Option<&str>) -> DraftReply {
        let mut rows: Vec<Vec<KeyButton>> = self
            .available
            .iter()
            .map(|i| vec![KeyButton::text(item_label(i, currency))])
            .collect();
        rows.push(vec![KeyButton::text(CANCEL)]);
        let restaurant = self.restaurant.as_deref().unwrap_or_default();
        DraftReply::Prompt {
            text: with_note(note, &format!("Menu for {restaurant}:\nSelect an item:")),
            markup: Markup::Keyboard(rows),
        }
    }

    fn review_prompt(&self, fee: f64, currency: &str) -> DraftReply {
        let mut lines: Vec<String> = self
            .items
            .iter()
            .map(|i| format!("• {}", item_label(i, currency)))
            .collect();
        let delivery = fee * self.items.len() as f64;
        lines.push(format!("Delivery: {} {currency}", format_price(delivery)));
        lines.push(format!(
            "Total: {} {currency}",
            format_price(self.total(fee))
        ));
        DraftReply::Prompt {
            text: format!(
                "Your order from {}:\n{}",
                self.restaurant.as_deref().unwrap_or_default(),
                lines.join("\n")
            ),
            markup: Markup::Keyboard(vec![
                vec![KeyButton::text(ADD_ANOTHER), KeyButton::text(REMOVE_LAST)],
                vec![KeyButton::text(DONE), KeyButton::text(CANCEL)],
            ]),
        }
    }

    fn location_prompt(&self, note: Option<&str>) -> DraftReply {
        DraftReply::Prompt {
            text: with_note(
                note,
                "Where should we deliver?\n\n🏠 My dorm: your registered block.\n\
                 📍 Share location: send your current pin (live location lets the deliverer find you).",
            ),
            markup: Markup::Keyboard(vec![
                vec![KeyButton::text(MY_DORM), KeyButton::location(SHARE_LOCATION)],
                vec![KeyButton::text(CANCEL)],
            ]),
        }
    }
}

fn with_note(note: Option<&str>, body: &str) -> String {
    match note {
        Some(note) => format!("{note}\n{body}"),
        None => body.to_string(),
    }
}

/// Item prices plus the delivery fee once per item.
pub fn cart_total(items: &[MenuItem], fee_per_item: f64) -> f64 {
    items.iter().map(|i| i.price).sum::<f64>() + fee_per_item * items.len() as f64
}

/// Comma-separated item names, as stored on the order row.
pub fn cart_summary(items: &[MenuItem]) -> String {
    items
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Firfir - 70 ETB`
pub fn item_label(item: &MenuItem, currency: &str) -> String {
    format!("{} - {} {currency}", item.name, format_price(item.price))
}

/// Whole amounts without decimals, otherwise two places.
pub fn format_price(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

/// Uniform four-digit code read aloud at hand-over.
pub fn verification_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DormbiteConfig {
        DormbiteConfig::default()
    }

    fn at_items(draft: &mut OrderDraft, config: &DormbiteConfig) {
        let r = config.restaurant("Fle").unwrap();
        draft.select_restaurant(r, &[], false, "ETB");
    }

    #[test]
    fn scenario_b_total_includes_fee_per_item() {
        let items = vec![
            MenuItem { name: "Firfir".into(), price: 70.0 },
            MenuItem { name: "Shiro".into(), price: 50.0 },
        ];
        assert_eq!(cart_total(&items, 15.0), 150.0);
        assert_eq!(cart_summary(&items), "Firfir, Shiro");
    }

    #[test]
    fn multi_item_cart_flow() {
        let config = config();
        let (mut draft, _) = OrderDraft::new(UserId(1), &config);
        assert_eq!(
            draft.handle_text("Fle", &config),
            DraftReply::RestaurantChosen("Fle".into())
        );
        at_items(&mut draft, &config);

        draft.handle_text("Firfir - 70 ETB", &config);
        assert_eq!(draft.step(), DraftStep::Review);
        draft.handle_text(ADD_ANOTHER, &config);
        draft.handle_text("Shiro - 50 ETB", &config);
        assert_eq!(draft.total(15.0), 150.0);

        draft.handle_text(DONE, &config);
        assert_eq!(draft.step(), DraftStep::Location);
        assert_eq!(draft.handle_text(MY_DORM, &config), DraftReply::PlaceAtDorm);

        let order = draft.to_new_order(None, 15.0, "1234".into(), false);
        assert_eq!(order.items, "Firfir, Shiro");
        assert_eq!(order.total_price, 150.0);
        assert_eq!(order.restaurant, "Fle");
        assert!(order.pickup.is_some());
    }

    #[test]
    fn premium_label_selects_restaurant() {
        let config = config();
        let (mut draft, _) = OrderDraft::new(UserId(1), &config);
        assert_eq!(
            draft.handle_text("Darek (Premium)", &config),
            DraftReply::RestaurantChosen("Darek".into())
        );
        assert!(matches!(
            draft.handle_text("Nowhere", &config),
            DraftReply::Prompt { .. }
        ));
    }

    #[test]
    fn sold_out_items_are_hidden() {
        let config = config();
        let (mut draft, _) = OrderDraft::new(UserId(1), &config);
        let reply = draft.select_restaurant(
            config.restaurant("Fle").unwrap(),
            &["Firfir".to_string()],
            false,
            "ETB",
        );
        let DraftReply::Prompt { markup, .. } = reply else {
            panic!("expected item prompt");
        };
        assert!(!markup.labels().contains(&"Firfir - 70 ETB"));
        assert!(markup.labels().contains(&"Shiro - 50 ETB"));
        assert!(matches!(
            draft.handle_text("Firfir - 70 ETB", &config),
            DraftReply::Prompt { .. }
        ));
        assert!(draft.items().is_empty());
    }

    #[test]
    fn contract_holder_chooses_kind() {
        let config = config();
        let (mut draft, _) = OrderDraft::new(UserId(1), &config);
        draft.select_restaurant(config.restaurant("Fle").unwrap(), &[], true, "ETB");
        assert_eq!(draft.step(), DraftStep::Kind);
        draft.handle_text(CONTRACT, &config);
        assert_eq!(draft.order_type(), OrderType::Contract);
        assert_eq!(draft.step(), DraftStep::Item);
    }

    #[test]
    fn removing_last_item_returns_to_menu() {
        let config = config();
        let (mut draft, _) = OrderDraft::new(UserId(1), &config);
        at_items(&mut draft, &config);
        draft.handle_text("Pasta - 60 ETB", &config);
        draft.handle_text(REMOVE_LAST, &config);
        assert_eq!(draft.step(), DraftStep::Item);
        assert!(draft.items().is_empty());
    }

    #[test]
    fn pin_only_accepted_at_location_step() {
        let config = config();
        let (mut draft, _) = OrderDraft::new(UserId(1), &config);
        let pin = GeoPoint::new(6.06, 37.56);
        assert!(draft.handle_location(pin).is_none());
        at_items(&mut draft, &config);
        draft.handle_text("Pasta - 60 ETB", &config);
        draft.handle_text(DONE, &config);
        assert_eq!(draft.handle_location(pin), Some(DraftReply::VerifyPin(pin)));

        draft.await_pin(3);
        assert_eq!(draft.step(), DraftStep::AwaitingPin { pin: 3 });
        draft.reject_pin();
        assert_eq!(draft.step(), DraftStep::Location);
    }

    #[test]
    fn cancel_is_available_everywhere() {
        let config = config();
        let (mut draft, _) = OrderDraft::new(UserId(1), &config);
        at_items(&mut draft, &config);
        assert!(matches!(
            draft.handle_text(CANCEL, &config),
            DraftReply::Cancelled { .. }
        ));
    }

    #[test]
    fn codes_are_four_digits() {
        for _ in 0..100 {
            let code: u32 = verification_code().parse().unwrap();
            assert!((1000..=9999).contains(&code));
        }
        assert_eq!(format_price(70.0), "70");
        assert_eq!(format_price(12.5), "12.50");
    }
}
