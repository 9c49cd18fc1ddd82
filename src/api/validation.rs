use std::str::FromStr;

use super::ApiError;
use crate::domain::ParseEnumError;

pub const MAX_PAGE_SIZE: u64 = 200;

pub fn validate_id(id: i32, what: &str) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Identifiant de {what} invalide : {id}"
        )));
    }
    Ok(id)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    let trimmed = username.trim();
    let len = trimmed.chars().count();
    if !(3..=50).contains(&len) {
        return Err(ApiError::validation(
            "Le nom d'utilisateur doit contenir entre 3 et 50 caractères",
        ));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(ApiError::validation(
            "Le nom d'utilisateur ne peut contenir que des lettres, chiffres, points, tirets et underscores",
        ));
    }

    Ok(trimmed)
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let trimmed = email.trim();
    let valid = matches!(
        trimmed.split_once('@'),
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
    );
    if !valid || trimmed.chars().any(char::is_whitespace) {
        return Err(ApiError::validation(format!("Adresse email invalide : {trimmed}")));
    }
    Ok(trimmed)
}

pub fn validate_required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("Le champ {field} est requis")));
    }
    Ok(trimmed)
}

pub fn validate_page_size(page_size: u64) -> Result<u64, ApiError> {
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(ApiError::validation(format!(
            "Taille de page invalide : {page_size}. Elle doit être comprise entre 1 et {MAX_PAGE_SIZE}"
        )));
    }
    Ok(page_size)
}

/// Rejects page numbers whose row offset cannot be expressed as an SQL offset.
pub fn validate_page(page: u64, page_size: u64) -> Result<u64, ApiError> {
    let page = page.max(1);
    let in_range = page
        .checked_mul(page_size)
        .is_some_and(|offset| i64::try_from(offset).is_ok());
    if !in_range {
        return Err(ApiError::validation(format!("Numéro de page invalide : {page}")));
    }
    Ok(page)
}

/// Parses an optional query value into one of the closed enums.
pub fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::parse)
        .transpose()
        .map_err(|e: ParseEnumError| ApiError::validation(e.to_string()))
}
