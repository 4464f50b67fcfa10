use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::catalog::{
        BannerList, BrandList, CategoryList, CreateProductRequest, CreateReviewRequest,
        ProductDetail, ProductList, ReviewList, UpdateProductRequest,
    },
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{
        Banner, Brand, Category, Product, ProductImage, ProductSpecification, ProductVariant,
        Review,
    },
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSort},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(Column::IsActive.eq(true));

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(slug) = query.category.as_ref().filter(|s| !s.is_empty()) {
        let ids = category_and_children_ids(state, slug).await?;
        condition = condition.add(Column::CategoryId.is_in(ids));
    }

    if let Some(slug) = query.brand.as_ref().filter(|s| !s.is_empty()) {
        let brand: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM brands WHERE slug = $1 AND is_active")
                .bind(slug)
                .fetch_optional(&state.pool)
                .await?;
        let brand = brand.ok_or(AppError::NotFound)?;
        condition = condition.add(Column::BrandId.eq(brand.0));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(featured) = query.featured {
        condition = condition.add(Column::IsFeatured.eq(featured));
    }

    let mut finder = Products::find().filter(condition);
    finder = match query.sort.unwrap_or(ProductSort::Newest) {
        ProductSort::Newest => finder.order_by_desc(Column::CreatedAt),
        ProductSort::PriceLow => finder.order_by_asc(Column::Price),
        ProductSort::PriceHigh => finder.order_by_desc(Column::Price),
        ProductSort::Popular => finder.order_by_desc(Column::TotalSales),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Catalog pages browse a category together with its direct children.
async fn category_and_children_ids(state: &AppState, slug: &str) -> AppResult<Vec<Uuid>> {
    let parent: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM categories WHERE slug = $1 AND is_active")
            .bind(slug)
            .fetch_optional(&state.pool)
            .await?;
    let parent = parent.ok_or(AppError::NotFound)?;

    let children: Vec<(Uuid,)> =
        sqlx::query_as("SELECT id FROM categories WHERE parent_id = $1 AND is_active")
            .bind(parent.0)
            .fetch_all(&state.pool)
            .await?;

    let mut ids = vec![parent.0];
    ids.extend(children.into_iter().map(|(id,)| id));
    Ok(ids)
}

pub async fn get_product_detail(
    state: &AppState,
    slug: &str,
) -> AppResult<ApiResponse<ProductDetail>> {
    // Detail views count toward the product's popularity.
    let product: Option<Product> = sqlx::query_as(
        "UPDATE products SET views = views + 1 WHERE slug = $1 AND is_active RETURNING *",
    )
    .bind(slug)
    .fetch_optional(&state.pool)
    .await?;
    let product = product.ok_or(AppError::NotFound)?;

    let images: Vec<ProductImage> = sqlx::query_as(
        "SELECT * FROM product_images WHERE product_id = $1 ORDER BY sort_order",
    )
    .bind(product.id)
    .fetch_all(&state.pool)
    .await?;

    let variants: Vec<ProductVariant> = sqlx::query_as(
        "SELECT * FROM product_variants WHERE product_id = $1 AND is_active ORDER BY name",
    )
    .bind(product.id)
    .fetch_all(&state.pool)
    .await?;

    let specifications: Vec<ProductSpecification> = sqlx::query_as(
        "SELECT * FROM product_specifications WHERE product_id = $1 ORDER BY sort_order",
    )
    .bind(product.id)
    .fetch_all(&state.pool)
    .await?;

    let average: (Option<f64>,) = sqlx::query_as(
        "SELECT AVG(rating)::float8 FROM reviews WHERE product_id = $1 AND is_approved",
    )
    .bind(product.id)
    .fetch_one(&state.pool)
    .await?;

    let counts: Vec<(i32, i64)> = sqlx::query_as(
        r#"
        SELECT rating, COUNT(*) FROM reviews
        WHERE product_id = $1 AND is_approved
        GROUP BY rating
        "#,
    )
    .bind(product.id)
    .fetch_all(&state.pool)
    .await?;

    let mut rating_counts: BTreeMap<i32, i64> = (1..=5).map(|r| (r, 0)).collect();
    for (rating, count) in counts {
        rating_counts.insert(rating, count);
    }

    let detail = ProductDetail {
        product,
        images,
        variants,
        specifications,
        average_rating: average.0.unwrap_or(0.0),
        rating_counts,
    };

    Ok(ApiResponse::success("Product", detail, None))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items: Vec<Category> = sqlx::query_as(
        "SELECT * FROM categories WHERE is_active ORDER BY sort_order, name",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(ApiResponse::success("Categories", CategoryList { items }, None))
}

pub async fn list_brands(state: &AppState) -> AppResult<ApiResponse<BrandList>> {
    let items: Vec<Brand> = sqlx::query_as("SELECT * FROM brands WHERE is_active ORDER BY name")
        .fetch_all(&state.pool)
        .await?;
    Ok(ApiResponse::success("Brands", BrandList { items }, None))
}

pub async fn list_banners(state: &AppState) -> AppResult<ApiResponse<BannerList>> {
    let items: Vec<Banner> = sqlx::query_as(
        r#"
        SELECT * FROM banners
        WHERE is_active
          AND (starts_at IS NULL OR starts_at <= now())
          AND (ends_at IS NULL OR ends_at >= now())
        ORDER BY sort_order
        "#,
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(ApiResponse::success("Banners", BannerList { items }, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let slug = slugify(&payload.name);
    let existing = Products::find()
        .filter(Column::Slug.eq(slug.clone()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(
            "A product with this name already exists".into(),
        ));
    }

    let id = Uuid::new_v4();
    let active = ActiveModel {
        id: Set(id),
        vendor_id: Set(payload.vendor_id),
        category_id: Set(payload.category_id),
        brand_id: Set(payload.brand_id),
        slug: Set(slug),
        sku: Set(generate_sku(id)),
        name: Set(payload.name),
        description: Set(Some(payload.description)),
        price: Set(payload.price),
        compare_price: Set(payload.compare_price),
        stock: Set(payload.stock),
        low_stock_threshold: NotSet,
        is_active: Set(true),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        views: Set(0),
        total_sales: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(compare_price) = payload.compare_price {
        active.compare_price = Set(Some(compare_price));
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    slug: &str,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest("Rating must be between 1 and 5".into()));
    }

    let product: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM products WHERE slug = $1 AND is_active")
            .bind(slug)
            .fetch_optional(&state.pool)
            .await?;
    let Some((product_id,)) = product else {
        return Err(AppError::NotFound);
    };

    // Only a delivered order containing the product marks the review verified.
    let purchased: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.user_id = $1 AND oi.product_id = $2
              AND o.status = 'delivered'
        )
        "#,
    )
    .bind(user.user_id)
    .bind(product_id)
    .fetch_one(&state.pool)
    .await?;

    let review: Option<Review> = sqlx::query_as(
        r#"
        INSERT INTO reviews (id, product_id, user_id, rating, title, comment, is_verified_purchase)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (product_id, user_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(user.user_id)
    .bind(payload.rating)
    .bind(payload.title)
    .bind(payload.comment)
    .bind(purchased.0)
    .fetch_optional(&state.pool)
    .await?;

    let review = review.ok_or_else(|| {
        AppError::BadRequest("You have already reviewed this product".into())
    })?;

    // New reviews sit unapproved until an admin moderates them.
    Ok(ApiResponse::success(
        "Review submitted and awaiting approval",
        review,
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews(
    state: &AppState,
    slug: &str,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let product: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE slug = $1")
        .bind(slug)
        .fetch_optional(&state.pool)
        .await?;
    let Some((product_id,)) = product else {
        return Err(AppError::NotFound);
    };

    let (page, limit, offset) = pagination.normalize();
    let items: Vec<Review> = sqlx::query_as(
        r#"
        SELECT * FROM reviews
        WHERE product_id = $1 AND is_approved
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE product_id = $1 AND is_approved")
            .bind(product_id)
            .fetch_one(&state.pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        vendor_id: model.vendor_id,
        category_id: model.category_id,
        brand_id: model.brand_id,
        name: model.name,
        slug: model.slug,
        sku: model.sku,
        description: model.description,
        price: model.price,
        compare_price: model.compare_price,
        stock: model.stock,
        low_stock_threshold: model.low_stock_threshold,
        is_active: model.is_active,
        is_featured: model.is_featured,
        views: model.views,
        total_sales: model.total_sales,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn generate_sku(id: Uuid) -> String {
    let hex = id.simple().to_string();
    hex[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Samsung Galaxy A15"), "samsung-galaxy-a15");
        assert_eq!(slugify("  Phones & Tablets  "), "phones-tablets");
        assert_eq!(slugify("4K--TV"), "4k-tv");
    }
}
