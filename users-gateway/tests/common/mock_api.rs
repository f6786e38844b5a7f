use serde_json::json;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

pub(crate) fn bill() -> serde_json::Value {
    json!({"id": "23", "firstName": "Bill", "age": 20, "companyId": "1"})
}

pub(crate) fn samantha() -> serde_json::Value {
    json!({"id": "41", "firstName": "Samantha", "age": 36, "companyId": "1"})
}

pub(crate) fn alex() -> serde_json::Value {
    json!({"id": "40", "firstName": "Alex", "age": 40, "companyId": null})
}

pub(crate) fn apple() -> serde_json::Value {
    json!({"id": "1", "name": "Apple", "description": "iphone"})
}

pub(crate) fn user_23() -> Mock {
    Mock::given(method("GET"))
        .and(path("/users/23"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bill()))
}

pub(crate) fn user_40() -> Mock {
    Mock::given(method("GET"))
        .and(path("/users/40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alex()))
}

pub(crate) fn user_missing() -> Mock {
    Mock::given(method("GET"))
        .and(path("/users/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({})))
}

pub(crate) fn company_1() -> Mock {
    Mock::given(method("GET"))
        .and(path("/companies/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(apple()))
}

pub(crate) fn company_1_error() -> Mock {
    Mock::given(method("GET"))
        .and(path("/companies/1"))
        .respond_with(ResponseTemplate::new(500))
}

pub(crate) fn company_1_users() -> Mock {
    Mock::given(method("GET"))
        .and(path("/companies/1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bill(), samantha()])))
}

/// Company 1 lists a user who has since moved to company 2.
pub(crate) fn company_1_users_with_a_leaver() -> Mock {
    let mut leaver = samantha();
    leaver["companyId"] = json!("2");
    Mock::given(method("GET"))
        .and(path("/companies/1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bill(), leaver])))
}

pub(crate) fn company_2_error() -> Mock {
    Mock::given(method("GET"))
        .and(path("/companies/2"))
        .respond_with(ResponseTemplate::new(500))
}

pub(crate) fn user_50() -> Mock {
    Mock::given(method("GET"))
        .and(path("/users/50"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "50", "firstName": "Nia", "age": 22})),
        )
}

pub(crate) fn create_user(body: serde_json::Value, created: serde_json::Value) -> Mock {
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(body))
        .respond_with(ResponseTemplate::new(201).set_body_json(created))
}

pub(crate) fn update_user(id: &str, updated: serde_json::Value) -> Mock {
    Mock::given(method("PATCH"))
        .and(path(format!("/users/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
}

pub(crate) fn delete_user(id: &str) -> Mock {
    Mock::given(method("DELETE"))
        .and(path(format!("/users/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
}
