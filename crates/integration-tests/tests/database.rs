//! Database-backed integration tests.
//!
//! These tests require a `PostgreSQL` database reachable through
//! `WARUNG_TEST_DATABASE_URL`. Migrations run automatically. Every test
//! creates its own users, categories and products, so they can share one
//! database and run in parallel.
//!
//! Run with: cargo test -p warung-integration-tests -- --ignored

use std::collections::HashSet;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use warung_core::pagination::{Limit, ProductCursor, ProductSort};
use warung_core::{CategoryId, OrderStatus, ProductId, Rupiah, UserRole};
use warung_integration_tests::{
    SUBJECT_HEADER, WEBHOOK_SECRET, create_user, router_with_pool, send, test_pool,
};
use warung_storefront::db::orders::{PaymentDetails, Settlement};
use warung_storefront::db::{
    AddressRepository, CategoryRepository, OrderRepository, ProductRepository, UserRepository,
};
use warung_storefront::models::{
    AddressInput, Category, NewAddress, NewCategory, NewOrder, NewProduct, OrderItemSnapshot,
    ProductFilters, generate_order_number,
};

fn address(label: &str, is_main: bool) -> NewAddress {
    AddressInput {
        receiver_name: "Siti Rahma".to_owned(),
        phone_number: "81234567890".to_owned(),
        label: label.to_owned(),
        province: "DI Yogyakarta".to_owned(),
        province_id: "5".to_owned(),
        city: "Yogyakarta".to_owned(),
        city_id: "501".to_owned(),
        subdistrict: "Gondokusuman".to_owned(),
        postal_code: "55221".to_owned(),
        complete_address: "Jl. Kaliurang No. 1".to_owned(),
        is_main,
    }
    .validate()
    .expect("valid address")
}

/// A fresh category with `count` products, all at the same price.
async fn seed_catalog(pool: &PgPool, count: usize, stock: i32) -> (String, Vec<ProductId>) {
    let slug = format!("test-{}", Uuid::new_v4().simple());
    let category = CategoryRepository::new(pool)
        .create(&NewCategory {
            name: "Test category".to_owned(),
            slug: slug.clone(),
            color: None,
            parent_id: None,
        })
        .await
        .expect("Failed to create category");

    let products = ProductRepository::new(pool);
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let product = products
            .create(&NewProduct {
                name: format!("Kopi Gayo {n}"),
                description: None,
                content: None,
                price: Rupiah::new(25_000),
                image_url: None,
                category_id: category.id,
                stock,
                is_archived: false,
            })
            .await
            .expect("Failed to create product");
        ids.push(product.id);
    }
    (slug, ids)
}

/// A pending order for `quantity` units of a fresh product with `stock`.
async fn place_order(pool: &PgPool, quantity: i32, stock: i32) -> (String, ProductId) {
    let user = create_user(pool, UserRole::User).await;
    let home = AddressRepository::new(pool)
        .create(user.id, &address("Rumah", true))
        .await
        .expect("address");
    let (_, ids) = seed_catalog(pool, 1, stock).await;
    let product_id = ids.first().copied().expect("one product");

    let order = OrderRepository::new(pool)
        .create_pending(&NewOrder {
            order_number: generate_order_number(chrono::Utc::now()),
            user_id: user.id,
            address_id: home.id,
            delivery_address: home.one_line(),
            courier: "jne".to_owned(),
            courier_service: "REG".to_owned(),
            items: vec![OrderItemSnapshot {
                product_id: Some(product_id),
                product_name: "Kopi Gayo 0".to_owned(),
                unit_price: Rupiah::new(25_000),
                quantity,
            }],
            shipping_amount: Rupiah::new(9_000),
        })
        .await
        .expect("pending order");
    assert_eq!(order.status, OrderStatus::Pending);
    (order.order_number, product_id)
}

fn bank_transfer() -> PaymentDetails {
    PaymentDetails {
        payment_type: Some("bank_transfer".to_owned()),
        currency: Some("IDR".to_owned()),
        settlement_time: None,
    }
}

// ============================================================================
// Addresses
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_single_main_address_invariant() {
    let pool = test_pool().await;
    let user = create_user(&pool, UserRole::User).await;
    let repo = AddressRepository::new(&pool);

    // First address becomes main even when not requested
    let home = repo.create(user.id, &address("Rumah", false)).await.expect("create");
    assert!(home.is_main);

    // Requesting main on a new address demotes the old one
    let office = repo.create(user.id, &address("Kantor", true)).await.expect("create");
    assert!(office.is_main);
    let main = repo.main(user.id).await.expect("main").expect("has main");
    assert_eq!(main.id, office.id);

    let all = repo.list(user.id).await.expect("list");
    assert_eq!(all.iter().filter(|a| a.is_main).count(), 1);

    // Deleting the main address promotes the newest remaining one
    repo.delete(user.id, office.id).await.expect("delete");
    let main = repo.main(user.id).await.expect("main").expect("has main");
    assert_eq!(main.id, home.id);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_addresses_are_private() {
    let pool = test_pool().await;
    let owner = create_user(&pool, UserRole::User).await;
    let other = create_user(&pool, UserRole::User).await;
    let repo = AddressRepository::new(&pool);

    let home = repo.create(owner.id, &address("Rumah", true)).await.expect("create");

    assert!(repo.get_owned(other.id, home.id).await.expect("query").is_none());
    assert!(repo.update(other.id, home.id, &address("Hijack", true)).await.is_err());
    assert!(repo.delete(other.id, home.id).await.is_err());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_update_promotes_and_demotes_main_address() {
    let pool = test_pool().await;
    let user = create_user(&pool, UserRole::User).await;
    let repo = AddressRepository::new(&pool);

    let home = repo.create(user.id, &address("Rumah", true)).await.expect("create");
    let office = repo.create(user.id, &address("Kantor", false)).await.expect("create");
    assert!(!office.is_main);

    // Promoting through update demotes the previous main
    let office = repo
        .update(user.id, office.id, &address("Kantor", true))
        .await
        .expect("promote");
    assert!(office.is_main);
    let all = repo.list(user.id).await.expect("list");
    assert_eq!(all.iter().filter(|a| a.is_main).count(), 1);
    assert!(all.iter().any(|a| a.id == home.id && !a.is_main));

    // Demoting the main leaves the user without one
    repo.update(user.id, office.id, &address("Kantor", false))
        .await
        .expect("demote");
    assert!(repo.main(user.id).await.expect("main").is_none());

    // A later create only becomes main when asked to
    let shop = repo.create(user.id, &address("Toko", false)).await.expect("create");
    assert!(!shop.is_main);
    assert!(repo.main(user.id).await.expect("main").is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_concurrent_creates_keep_one_main_address() {
    let pool = test_pool().await;
    let user = create_user(&pool, UserRole::User).await;

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let pool = pool.clone();
            let user_id = user.id;
            tokio::spawn(async move {
                AddressRepository::new(&pool)
                    .create(user_id, &address(&format!("Alamat {n}"), n % 2 == 0))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("task panicked").expect("create");
    }

    let all = AddressRepository::new(&pool).list(user.id).await.expect("list");
    assert_eq!(all.len(), 16);
    assert_eq!(all.iter().filter(|a| a.is_main).count(), 1);
}

// ============================================================================
// Keyset pagination
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_keyset_pages_cover_ties_without_overlap() {
    let pool = test_pool().await;
    let (slug, ids) = seed_catalog(&pool, 5, 10).await;
    let repo = ProductRepository::new(&pool);
    let sort = ProductSort::LowestPrice;
    let limit = Limit::new(Some(2), 12).expect("limit");

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let filters = ProductFilters {
            category: Some(slug.clone()),
            ..ProductFilters::default()
        };
        let page = repo
            .list_public(filters, sort, cursor, limit)
            .await
            .expect("list");
        pages += 1;
        assert!(page.items.len() <= 2);
        seen.extend(page.items.iter().map(|p| p.id));

        match page.next_cursor {
            Some(token) => cursor = Some(ProductCursor::decode(&token, sort).expect("own cursor")),
            None => break,
        }
        assert!(pages < 10, "pagination does not terminate");
    }

    assert_eq!(pages, 3);
    let unique: HashSet<_> = seen.iter().collect();
    let expected: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), seen.len(), "a product appeared on two pages");
    assert_eq!(unique, expected);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_cursor_from_another_sort_is_rejected() {
    let pool = test_pool().await;
    let (slug, _) = seed_catalog(&pool, 3, 10).await;
    let page = ProductRepository::new(&pool)
        .list_public(
            ProductFilters {
                category: Some(slug),
                ..ProductFilters::default()
            },
            ProductSort::Newest,
            None,
            Limit::new(Some(1), 12).expect("limit"),
        )
        .await
        .expect("list");

    let token = page.next_cursor.expect("more pages");
    assert!(ProductCursor::decode(&token, ProductSort::BestSeller).is_err());
}

// ============================================================================
// Payment settlement
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_settlement_is_applied_once() {
    let pool = test_pool().await;
    let (order_number, product_id) = place_order(&pool, 2, 5).await;
    let orders = OrderRepository::new(&pool);
    let details = bank_transfer();

    let first = orders.mark_paid(&order_number, &details).await.expect("settle");
    assert_eq!(first, Settlement::Applied { stock_shortfall: false });

    // A retried notification must not decrement stock again
    let second = orders.mark_paid(&order_number, &details).await.expect("settle");
    assert_eq!(second, Settlement::AlreadySettled(OrderStatus::Paid));

    let product = ProductRepository::new(&pool).get_one(product_id).await.expect("product");
    assert_eq!(product.stock, 3);
    assert_eq!(product.sold_count, 2);

    // A late failure notification cannot undo the payment
    let late = orders
        .mark_failed(&order_number, OrderStatus::Expired)
        .await
        .expect("mark failed");
    assert_eq!(late, Settlement::AlreadySettled(OrderStatus::Paid));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_settlement_never_drives_stock_negative() {
    let pool = test_pool().await;
    let (order_number, product_id) = place_order(&pool, 3, 2).await;
    let orders = OrderRepository::new(&pool);

    let settlement = orders
        .mark_paid(&order_number, &bank_transfer())
        .await
        .expect("settle");
    assert_eq!(settlement, Settlement::Applied { stock_shortfall: true });

    let product = ProductRepository::new(&pool).get_one(product_id).await.expect("product");
    assert_eq!(product.stock, 2);
    assert_eq!(product.sold_count, 0);

    let order = orders
        .find_by_number(&order_number)
        .await
        .expect("query")
        .expect("order exists");
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.stock_shortfall);
}

// ============================================================================
// Categories
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_concurrent_reparenting_cannot_build_a_cycle() {
    let pool = test_pool().await;
    let repo = CategoryRepository::new(&pool);
    let top = |name: &str| NewCategory {
        name: name.to_owned(),
        slug: format!("{}-{}", name.to_lowercase(), Uuid::new_v4().simple()),
        color: None,
        parent_id: None,
    };
    let first = repo.create(&top("Minuman")).await.expect("create");
    let second = repo.create(&top("Makanan")).await.expect("create");

    let reparent = |child: &Category, parent_id: CategoryId| {
        let pool = pool.clone();
        let update = NewCategory {
            name: child.name.clone(),
            slug: child.slug.clone(),
            color: None,
            parent_id: Some(parent_id),
        };
        let id = child.id;
        tokio::spawn(async move { CategoryRepository::new(&pool).update(id, &update).await })
    };
    let a = reparent(&first, second.id);
    let b = reparent(&second, first.id);
    let a = a.await.expect("task panicked");
    let b = b.await.expect("task panicked");
    assert!(a.is_err() || b.is_err(), "both categories became children");

    let first = repo.get_by_slug(&first.slug).await.expect("query").expect("exists");
    let second = repo.get_by_slug(&second.slug).await.expect("query").expect("exists");
    assert!(first.parent_id.is_none() || second.parent_id.is_none());
}

// ============================================================================
// Through the router
// ============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_admin_routes_check_role() {
    let pool = test_pool().await;
    let customer = create_user(&pool, UserRole::User).await;
    let admin = create_user(&pool, UserRole::Admin).await;

    let request = |subject: &str| {
        Request::builder()
            .uri("/api/admin/orders/summary")
            .header(SUBJECT_HEADER, subject)
            .body(Body::empty())
            .expect("valid request")
    };

    let response = send(router_with_pool(pool.clone()), request(&customer.external_id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(router_with_pool(pool.clone()), request(&admin.external_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // A subject with no local user is anonymous
    let response = send(router_with_pool(pool), request("user_missing")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (WARUNG_TEST_DATABASE_URL)"]
async fn test_identity_events_are_idempotent() {
    let pool = test_pool().await;
    let external_id = format!("user_{}", Uuid::new_v4().simple());
    let email = format!("{}@example.com", Uuid::new_v4().simple());

    let event = |kind: &str, role: &str| {
        let body = json!({
            "type": kind,
            "data": {
                "id": external_id,
                "first_name": "Budi",
                "last_name": "Santoso",
                "email_addresses": [{"email_address": email}],
                "public_metadata": {"role": role},
            }
        });
        Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/identity")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {WEBHOOK_SECRET}"))
            .body(Body::from(body.to_string()))
            .expect("valid request")
    };

    // Delivered twice; the second insert is a no-op
    for _ in 0..2 {
        let response = send(router_with_pool(pool.clone()), event("user.created", "admin")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let users = UserRepository::new(&pool);
    let user = users
        .get_by_external_id(&external_id)
        .await
        .expect("query")
        .expect("user created");
    assert_eq!(user.name, "Budi Santoso");
    // Sign-ups are customers regardless of metadata
    assert_eq!(user.role, UserRole::User);

    let response = send(router_with_pool(pool.clone()), event("user.updated", "admin")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let user = users
        .get_by_external_id(&external_id)
        .await
        .expect("query")
        .expect("user exists");
    assert_eq!(user.role, UserRole::Admin);
}
