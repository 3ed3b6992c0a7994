//! Item database operations
//!
//! Single-row operations take a `&mut SqliteConnection` so the upsert can run
//! them inside one transaction; listing queries run against the pool.

use crate::models::{Item, ItemId, StoredItem};
use hn_common::{Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;

/// Sort column for item listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemOrder {
    #[default]
    Score,
    /// Creation time (`timestamp` column)
    Time,
    Id,
}

impl ItemOrder {
    fn column(self) -> &'static str {
        match self {
            ItemOrder::Score => "score",
            ItemOrder::Time => "timestamp",
            ItemOrder::Id => "id",
        }
    }
}

impl FromStr for ItemOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "score" => Ok(ItemOrder::Score),
            "time" => Ok(ItemOrder::Time),
            "id" => Ok(ItemOrder::Id),
            other => Err(Error::InvalidInput(format!(
                "order_by must be one of score, time, id (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(Error::InvalidInput(format!(
                "order_direction must be asc or desc (got '{}')",
                other
            ))),
        }
    }
}

/// Filters, ordering and paging for [`query_items`]
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub item_id: Option<ItemId>,
    pub min_score: Option<i64>,
    /// Case-insensitive title substring; blank is ignored
    pub keyword: Option<String>,
    pub order_by: ItemOrder,
    pub direction: SortDirection,
    /// 1-based page number
    pub page: u32,
    pub size: u32,
}

impl ItemQuery {
    fn push_filters<'a>(&self, builder: &mut QueryBuilder<'a, Sqlite>) {
        builder.push(" WHERE 1 = 1");

        if let Some(id) = self.item_id {
            builder.push(" AND id = ").push_bind(id);
        }
        if let Some(min_score) = self.min_score {
            builder.push(" AND score >= ").push_bind(min_score);
        }
        if let Some(keyword) = self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            builder
                .push(" AND instr(lower(title), ")
                .push_bind(keyword.to_lowercase())
                .push(") > 0");
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.size)
    }
}

/// Load item by id
pub async fn find_item(conn: &mut SqliteConnection, id: ItemId) -> Result<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, title, url, score, author, timestamp, descendants, item_type, text
        FROM items
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(item)
}

/// Insert a new item
pub async fn insert_item(conn: &mut SqliteConnection, item: &Item) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO items (
            id, title, url, score, author, timestamp, descendants, item_type, text,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id)
    .bind(&item.title)
    .bind(&item.url)
    .bind(item.score)
    .bind(&item.author)
    .bind(item.timestamp)
    .bind(item.descendants)
    .bind(&item.item_type)
    .bind(&item.text)
    .bind(&now)
    .bind(&now)
    .execute(conn)
    .await?;

    Ok(())
}

/// Overwrite every mutable column of an existing item
pub async fn update_item(conn: &mut SqliteConnection, item: &Item) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE items SET
            title = ?, url = ?, score = ?, author = ?, timestamp = ?,
            descendants = ?, item_type = ?, text = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&item.title)
    .bind(&item.url)
    .bind(item.score)
    .bind(&item.author)
    .bind(item.timestamp)
    .bind(item.descendants)
    .bind(&item.item_type)
    .bind(&item.text)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(item.id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("item {}", item.id)));
    }

    Ok(())
}

/// One page of items plus the total number of matches
pub async fn query_items(pool: &SqlitePool, query: &ItemQuery) -> Result<(Vec<StoredItem>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM items");
    query.push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(
        "SELECT id, title, url, score, author, timestamp, descendants, item_type, text, \
         created_at, updated_at FROM items",
    );
    query.push_filters(&mut select);

    let direction = query.direction.keyword();
    select.push(format!(
        " ORDER BY {} {}, id {}",
        query.order_by.column(),
        direction,
        direction
    ));
    select.push(" LIMIT ").push_bind(i64::from(query.size));
    select.push(" OFFSET ").push_bind(query.offset());

    let items = select.build_query_as::<StoredItem>().fetch_all(pool).await?;

    Ok((items, total))
}

/// Total stored items
pub async fn count_items(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
