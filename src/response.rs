//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size as u64)
        };
        PageMeta {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

#[derive(Serialize)]
pub struct Deleted {
    pub success: bool,
    pub id: uuid::Uuid,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data }))
}

pub fn success_page<T: Serialize>(data: Vec<T>, meta: PageMeta) -> (StatusCode, Json<SuccessMany<T>>) {
    (StatusCode::OK, Json(SuccessMany { data, meta }))
}

pub fn deleted(id: uuid::Uuid) -> (StatusCode, Json<Deleted>) {
    (StatusCode::OK, Json(Deleted { success: true, id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_meta_rounds_total_pages_up() {
        assert_eq!(PageMeta::new(1, 20, 41).total_pages, 3);
        assert_eq!(PageMeta::new(1, 20, 40).total_pages, 2);
        assert_eq!(PageMeta::new(1, 20, 0).total_pages, 0);
    }

    #[test]
    fn page_meta_serializes_camel_case() {
        let v = serde_json::to_value(PageMeta::new(2, 10, 15)).unwrap();
        assert_eq!(v["pageSize"], 10);
        assert_eq!(v["totalPages"], 2);
    }
}
