//! Whitelisted RPC method names, relative to the configured app namespace.

pub const LOGIN: &str = "api.auth.login";

pub const CREATE_CART: &str = "api.cart.create_cart";
pub const GET_CART: &str = "api.cart.get_cart";
pub const MODIFY_CART: &str = "api.cart.modify_cart";
pub const SUBMIT_CART: &str = "api.cart.submit_cart";

pub const LIST_QUOTATIONS: &str = "api.account.list_quotations";
pub const GET_STATEMENT: &str = "api.account.get_statement";

pub const GET_ITEMS: &str = "api.catalog.get_items";
pub const SEARCH_ITEMS: &str = "api.catalog.search_items";
pub const GET_ITEM: &str = "api.catalog.get_item";

/// `action` values accepted by [`MODIFY_CART`].
pub mod actions {
    pub const ADD_ITEM: &str = "add_item";
    pub const UPDATE_ITEM: &str = "update_item";
    pub const DELETE_ITEM: &str = "delete_item";
    pub const UPDATE_PARENT: &str = "update_parent";
}
