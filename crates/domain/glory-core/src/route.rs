//! Route table for location paths and fragments.
//!
//! Paths come from clean URLs (`/cv-builder`, `/order/42`), fragments from the
//! older hash-based links (`#order-details=42`, `#product/7`). Both are matched
//! without allocating a router; the resolver decides precedence.

use crate::section::{Section, SpecialRoute};

/// Full-document destinations. Admin and shopkeeper areas are sections rather
/// than special routes, but they share the same precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialTarget {
    Route(SpecialRoute),
    Admin,
    Shopkeeper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch {
    Special(SpecialTarget),
    Section(Section),
    BareRoot,
    Unknown,
}

fn normalize_path(path: &str) -> &str {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn non_empty(id: &str) -> Option<String> {
    let id = id.trim().trim_matches('/');
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn is_area(path: &str, area: &str) -> bool {
    path == area
        || path
            .strip_prefix(area)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn match_path(path: &str) -> RouteMatch {
    let path = normalize_path(path);

    if path == "/" {
        return RouteMatch::BareRoot;
    }

    if let Some(id) = path.strip_prefix("/order/") {
        return RouteMatch::Special(SpecialTarget::Route(SpecialRoute::OrderDetails {
            order_id: non_empty(id),
        }));
    }
    if let Some(id) = path.strip_prefix("/product/") {
        if let Some(product_id) = non_empty(id) {
            return RouteMatch::Special(SpecialTarget::Route(SpecialRoute::ProductDetail {
                product_id,
            }));
        }
        return RouteMatch::Unknown;
    }
    if is_area(path, "/admin") {
        return RouteMatch::Special(SpecialTarget::Admin);
    }
    if is_area(path, "/shopkeeper") {
        return RouteMatch::Special(SpecialTarget::Shopkeeper);
    }

    let special = match path {
        "/order-details" => Some(SpecialRoute::OrderDetails { order_id: None }),
        "/orders" | "/order-history" => Some(SpecialRoute::OrderHistory),
        "/cart" => Some(SpecialRoute::Cart),
        "/checkout" => Some(SpecialRoute::Checkout),
        "/profile" => Some(SpecialRoute::Profile),
        "/reset-password" | "/password-reset" => Some(SpecialRoute::PasswordReset),
        _ => None,
    };
    if let Some(route) = special {
        return RouteMatch::Special(SpecialTarget::Route(route));
    }

    if is_area(path, "/cv-builder") || is_area(path, "/resume-templates") {
        return RouteMatch::Section(Section::CvBuilder);
    }
    if is_area(path, "/id-card-print") {
        return RouteMatch::Section(Section::IdCardPrint);
    }
    if is_area(path, "/marketplace") {
        return RouteMatch::Section(Section::Marketplace);
    }

    RouteMatch::Unknown
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Match a location fragment. An empty fragment is `BareRoot`.
pub fn match_fragment(fragment: &str) -> RouteMatch {
    let fragment = fragment.trim().trim_start_matches('#');
    if fragment.is_empty() {
        return RouteMatch::BareRoot;
    }

    let (head, query) = fragment.split_once('?').unwrap_or((fragment, ""));

    // `order-details=01`, `order-details:01`, `order-details?orderId=01`
    if let Some(rest) = head.strip_prefix("order-details") {
        let order_id = match rest.chars().next() {
            Some('=') | Some(':') => non_empty(&rest[1..]),
            None => query_param(query, "orderId").and_then(non_empty),
            Some(_) => return RouteMatch::Unknown,
        };
        return RouteMatch::Special(SpecialTarget::Route(SpecialRoute::OrderDetails { order_id }));
    }
    if let Some(id) = head.strip_prefix("product/") {
        return match non_empty(id) {
            Some(product_id) => RouteMatch::Special(SpecialTarget::Route(
                SpecialRoute::ProductDetail { product_id },
            )),
            None => RouteMatch::Unknown,
        };
    }
    if is_area(head, "admin") {
        return RouteMatch::Special(SpecialTarget::Admin);
    }
    if is_area(head, "shopkeeper") {
        return RouteMatch::Special(SpecialTarget::Shopkeeper);
    }

    match head {
        "cart" => RouteMatch::Special(SpecialTarget::Route(SpecialRoute::Cart)),
        "checkout" => RouteMatch::Special(SpecialTarget::Route(SpecialRoute::Checkout)),
        "orders" | "order-history" => {
            RouteMatch::Special(SpecialTarget::Route(SpecialRoute::OrderHistory))
        }
        "profile" => RouteMatch::Special(SpecialTarget::Route(SpecialRoute::Profile)),
        "reset-password" | "password-reset" => {
            RouteMatch::Special(SpecialTarget::Route(SpecialRoute::PasswordReset))
        }
        "products" | "marketplace" => RouteMatch::Section(Section::Marketplace),
        _ => RouteMatch::Unknown,
    }
}
