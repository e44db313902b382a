//! Offer search tool
//!
//! Structured offer search used by the chat assistant's `search_offers` tool.
//! City matching accepts every stored city format: plain name, the nationwide
//! sentinel, a comma-separated list, or a JSON-array-shaped string.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::services::llm::ToolDefinition;
use migration::entities::{business, offer};

/// 全国通用的城市标记
pub const NATIONWIDE: &str = "koko maa";
/// 单次搜索最多返回条数
pub const SEARCH_LIMIT: u64 = 10;
pub const SEARCH_TOOL_NAME: &str = "search_offers";

/// LIKE 转义字符（`\` 在 MySQL 字符串字面量中有特殊含义，故不用）
const LIKE_ESCAPE: char = '!';

/// Categories the model may pass; English and Finnish names.
pub const CATEGORIES: &[&str] = &[
    "food",
    "fashion",
    "electronics",
    "beauty",
    "sports",
    "home",
    "automotive",
    "travel",
    "entertainment",
    "Ruoka ja juoma",
    "Muoti",
    "Teknologia",
    "Kauneus",
    "Urheilu ja vapaa-aika",
    "Koti",
    "Autot",
    "Matkailu",
    "Viihde",
];

/// Search parameters as produced by the model's tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// Accepted for schema compatibility; eligibility is always enforced
    #[serde(default = "default_active_only")]
    pub active_only: bool,
}

fn default_active_only() -> bool {
    true
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            category: None,
            keywords: None,
            city: None,
            active_only: true,
        }
    }
}

impl SearchParams {
    /// 空白字符串视为未提供
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            category: clean(self.category),
            keywords: clean(self.keywords),
            city: clean(self.city),
            active_only: self.active_only,
        }
    }
}

/// Offer in the shape the frontend offer cards expect
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub is_premium: bool,
    pub is_nationwide: bool,
    pub offer_type: Option<String>,
    pub cost: Option<f64>,
    pub business_name: Option<String>,
    pub merchant_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub valid_from: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub offer_url: Option<String>,
    pub website: Option<String>,
    pub status: String,
    pub business_id: Option<i64>,
}

impl OfferSummary {
    pub fn from_models(offer: offer::Model, owner: Option<&business::Model>) -> Self {
        let business_name = owner.map(|b| b.business_name.clone());
        Self {
            id: offer.id,
            title: offer.title,
            description: offer.description,
            keywords: offer.keywords,
            city: offer.city,
            category: offer.category,
            address: offer.address,
            is_premium: offer.is_premium,
            is_nationwide: offer.is_nationwide,
            offer_type: offer.offer_type,
            cost: offer.cost,
            merchant_name: business_name.clone(),
            business_name,
            phone: owner.and_then(|b| b.phone.clone()),
            email: owner.and_then(|b| b.email.clone()),
            expires_at: offer.expires_at,
            valid_until: offer.expires_at,
            starts_at: offer.starts_at,
            valid_from: offer.starts_at,
            created_at: offer.created_at,
            approved_at: offer.approved_at,
            image_url: offer.image_url,
            website: offer.offer_url.clone(),
            offer_url: offer.offer_url,
            status: offer.status,
            business_id: offer.business_id,
        }
    }
}

/// `search_offers` tool schema
pub fn tool_definition() -> ToolDefinition {
    ToolDefinition::function(
        SEARCH_TOOL_NAME,
        "Search for deals and offers based on user criteria. Use this when users ask about \
         discounts, deals, offers, or specific products/categories. If you're not sure about \
         the category, don't specify it - search broadly with keywords only.",
        json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "Product category - ONLY use if you're certain about the category. For unknown items, leave this empty and use keywords instead.",
                    "enum": CATEGORIES,
                },
                "keywords": {
                    "type": "string",
                    "description": "Keywords to search in offer title, description and keywords (e.g. 'computer', 'pizza', 'shoes')",
                },
                "city": {
                    "type": "string",
                    "description": "City name to filter offers by location",
                },
                "active_only": {
                    "type": "boolean",
                    "description": "Whether to show only currently active offers",
                    "default": true,
                },
            },
            "required": [],
        }),
    )
}

/// 转义 LIKE 通配符
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

fn like(sql_expr: &str, pattern: String) -> sea_orm::sea_query::SimpleExpr {
    Expr::cust_with_values(
        format!("{} LIKE ? ESCAPE '{}'", sql_expr, LIKE_ESCAPE),
        [pattern],
    )
}

/// 城市匹配条件（五种情况任一成立）
///
/// 1. 存储值为 "koko maa"
/// 2. 存储值等于查询城市
/// 3. 存储值为逗号分隔列表，其中一项等于查询城市
/// 4. 存储值为 JSON 数组形式，含 "koko maa"
/// 5. 存储值为 JSON 数组形式，含查询城市
///
/// 比较均忽略大小写与首尾空白。
pub fn city_condition(city: &str) -> Condition {
    let query = city.trim().to_lowercase();
    let compact: String = query.chars().filter(|c| !c.is_whitespace()).collect();
    let escaped = escape_like(&compact);

    let trimmed = "LOWER(TRIM(city))";
    let listed = "REPLACE(LOWER(city), ' ', '')";

    Condition::any()
        .add(Expr::cust_with_values(
            format!("{} = ?", trimmed),
            [NATIONWIDE.to_string()],
        ))
        .add(Expr::cust_with_values(format!("{} = ?", trimmed), [query.clone()]))
        .add(
            Condition::any()
                .add(Expr::cust_with_values(format!("{} = ?", listed), [compact.clone()]))
                .add(like(listed, format!("{},%", escaped)))
                .add(like(listed, format!("%,{}", escaped)))
                .add(like(listed, format!("%,{},%", escaped))),
        )
        .add(like(
            "LOWER(city)",
            format!("%[\"%{}%\"]%", escape_like(NATIONWIDE)),
        ))
        .add(like("LOWER(city)", format!("%[\"%{}%\"]%", escape_like(&query))))
}

/// 关键词匹配标题、描述或关键词字段任一
pub fn keyword_condition(keywords: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&keywords.trim().to_lowercase()));
    Condition::any()
        .add(like("LOWER(title)", pattern.clone()))
        .add(like("LOWER(description)", pattern.clone()))
        .add(like("LOWER(keywords)", pattern))
}

/// 分类精确匹配（忽略大小写）
pub fn category_condition(category: &str) -> Condition {
    Condition::all().add(Expr::cust_with_values(
        "LOWER(category) = ?",
        [category.trim().to_lowercase()],
    ))
}

pub struct OfferSearch {
    db: DatabaseConnection,
}

impl OfferSearch {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn search(&self, params: &SearchParams) -> Result<Vec<OfferSummary>, DbErr> {
        let params = params.clone().normalized();
        let now = Utc::now();

        let mut query = offer::Entity::find()
            .filter(offer::Column::Status.eq(offer::STATUS_APPROVED))
            .filter(
                Condition::any()
                    .add(offer::Column::ExpiresAt.is_null())
                    .add(offer::Column::ExpiresAt.gt(now)),
            );

        if let Some(keywords) = &params.keywords {
            query = query.filter(keyword_condition(keywords));
        }
        if let Some(category) = &params.category {
            query = query.filter(category_condition(category));
        }
        if let Some(city) = &params.city {
            query = query.filter(city_condition(city));
        }

        let offers = query
            .order_by_desc(offer::Column::IsPremium)
            .order_by_desc(offer::Column::CreatedAt)
            .order_by_desc(offer::Column::Id)
            .limit(SEARCH_LIMIT)
            .all(&self.db)
            .await?;

        let owners = self.load_businesses(&offers).await?;

        debug!(
            "Offer search (keywords={:?}, category={:?}, city={:?}) found {} offers",
            params.keywords,
            params.category,
            params.city,
            offers.len()
        );

        Ok(offers
            .into_iter()
            .map(|o| {
                let owner = o.business_id.and_then(|id| owners.get(&id));
                OfferSummary::from_models(o, owner)
            })
            .collect())
    }

    async fn load_businesses(
        &self,
        offers: &[offer::Model],
    ) -> Result<HashMap<i64, business::Model>, DbErr> {
        let mut ids: Vec<i64> = offers.iter().filter_map(|o| o.business_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = business::Entity::find()
            .filter(business::Column::Id.is_in(ids))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|b| (b.id, b)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off!"), "50!%!_off!!");
        assert_eq!(escape_like("helsinki"), "helsinki");
    }

    #[test]
    fn test_params_normalized() {
        let params = SearchParams {
            category: Some("  ".into()),
            keywords: Some(" pizza ".into()),
            city: None,
            active_only: false,
        }
        .normalized();
        assert_eq!(params.category, None);
        assert_eq!(params.keywords.as_deref(), Some("pizza"));
        assert!(!params.active_only);
    }

    #[test]
    fn test_params_from_tool_arguments() {
        let params: SearchParams = serde_json::from_str(r#"{"keywords":"kahvi"}"#).unwrap();
        assert!(params.active_only);
        assert_eq!(params.keywords.as_deref(), Some("kahvi"));
        assert!(params.city.is_none());
    }

    #[test]
    fn test_tool_definition_schema() {
        let tool = tool_definition();
        assert_eq!(tool.kind, "function");
        assert_eq!(tool.function.name, SEARCH_TOOL_NAME);
        let enum_values = tool.function.parameters["properties"]["category"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(enum_values.len(), CATEGORIES.len());
        assert!(
            tool.function.parameters["required"]
                .as_array()
                .unwrap()
                .is_empty()
        );
    }
}
