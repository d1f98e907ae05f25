// File: modshop-core/src/repositories/postgres/mods.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, QueryBuilder, Row};
use tracing::info;

use modshop_common::error::Error;
use modshop_common::models::{ModItem, ModListing, ModUpdate};
use modshop_common::traits::repository_traits::ModRepository;

use super::is_unique_violation;

pub struct PostgresModRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresModRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_mod(r: &PgRow) -> Result<ModItem, Error> {
    Ok(ModItem {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        price: r.try_get("price")?,
        image_url: r.try_get("image_url")?,
        default_claims_max: r.try_get("default_claims_max")?,
        x_coordinate: r.try_get("x_coordinate")?,
        y_coordinate: r.try_get("y_coordinate")?,
    })
}

#[async_trait]
impl ModRepository for PostgresModRepository {
    async fn create_mod(&self, item: &ModItem) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO mods (
                id,
                name,
                description,
                price,
                image_url,
                default_claims_max,
                x_coordinate,
                y_coordinate
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            ON CONFLICT DO NOTHING
            "#,
        )
            .bind(item.id)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.price)
            .bind(&item.image_url)
            .bind(item.default_claims_max)
            .bind(item.x_coordinate)
            .bind(item.y_coordinate)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::DuplicateMod(format!("id {} or name '{}'", item.id, item.name)));
        }
        info!("Created mod {} ({})", item.id, item.name);
        Ok(())
    }

    async fn get_mod(&self, mod_id: i32) -> Result<Option<ModItem>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT id, name, description, price, image_url,
                   default_claims_max, x_coordinate, y_coordinate
            FROM mods
            WHERE id = $1
            "#,
        )
            .bind(mod_id)
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_mod).transpose()
    }

    async fn list_mods(&self) -> Result<Vec<ModListing>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.name, m.description, m.price, m.image_url,
                   m.default_claims_max, m.x_coordinate, m.y_coordinate,
                   (SELECT COUNT(*) FROM accounts a
                     WHERE a.mod_id = m.id AND a.is_available = TRUE) AS stock
            FROM mods m
            ORDER BY m.id
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::with_capacity(rows.len());
        for r in rows {
            list.push(ModListing {
                item: row_to_mod(&r)?,
                stock: r.try_get("stock")?,
            });
        }
        Ok(list)
    }

    async fn find_mods_by_price(&self, amount: Decimal, tolerance: Decimal) -> Result<Vec<ModItem>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price, image_url,
                   default_claims_max, x_coordinate, y_coordinate
            FROM mods
            WHERE price BETWEEN $1 AND $2
            ORDER BY id
            "#,
        )
            .bind(amount - tolerance)
            .bind(amount + tolerance)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_mod).collect()
    }

    async fn update_mod_details(&self, mod_id: i32, updates: &[ModUpdate]) -> Result<(), Error> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE mods SET ");
        let mut set = qb.separated(", ");
        for update in updates {
            set.push(format!("{} = ", update.column()));
            match update {
                ModUpdate::Name(v) | ModUpdate::Description(v) | ModUpdate::ImageUrl(v) => {
                    set.push_bind_unseparated(v.clone());
                }
                ModUpdate::Price(v) => {
                    set.push_bind_unseparated(*v);
                }
                ModUpdate::DefaultClaimsMax(v) => {
                    set.push_bind_unseparated(*v);
                }
                ModUpdate::XCoordinate(v) | ModUpdate::YCoordinate(v) => {
                    set.push_bind_unseparated(*v);
                }
            }
        }
        qb.push(" WHERE id = ");
        qb.push_bind(mod_id);

        let result = match qb.build().execute(&self.pool).await {
            Ok(r) => r,
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::DuplicateMod("a mod with that name already exists".into()));
            }
            Err(e) => return Err(e.into()),
        };

        if result.rows_affected() == 0 {
            return Err(Error::ModNotFound(mod_id));
        }
        info!("Updated mod {}: {:?}", mod_id, updates.iter().map(|u| u.column()).collect::<Vec<_>>());
        Ok(())
    }
}
