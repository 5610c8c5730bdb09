use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::{ApiClient, FetchPolicy, FetchState, Session, MAX_FETCH_ATTEMPTS};
use crate::export::{self, ExportFormat, Exportable};
use crate::page::{self, PageRequest};
use crate::query::{apply_query, FilterFlag, QueryState, SortKey};
use crate::records::{Booking, Collection, Spa};
use crate::view::ListView;

fn spa(id: &str, name: &str, locality: &str, price: f64, discount: f64) -> Spa {
    serde_json::from_value(json!({
        "_id": id,
        "name": name,
        "location": { "locality": locality, "district": "Kathmandu" },
        "contacts": { "phone": "9800000000", "website": "" },
        "startingPrice": price,
        "discount": discount,
    }))
    .unwrap()
}

fn sample_spas() -> Vec<Spa> {
    vec![
        spa("s1", "Zen Garden Spa", "Thamel", 3500.0, 10.0),
        spa("s2", "Aqua Bliss", "Patan", 2000.0, 0.0),
        spa("s3", "Serenity Falls", "Boudha", 2000.0, 25.0),
        spa("s4", "Blue Lagoon Spa", "Thamel", 4200.0, 0.0),
        spa("s5", "Garden Retreat", "Patan", 1800.0, 15.0),
    ]
}

fn sample_bookings(count: usize) -> Vec<Booking> {
    (1..=count)
        .map(|n| {
            serde_json::from_value(json!({
                "_id": format!("b{n}"),
                "name": format!("Guest {n:02}"),
                "phone": format!("98000000{n:02}"),
                "time": "10:00",
                "serviceTital": "Hot Stone",
                "status": "confirmed",
            }))
            .unwrap()
        })
        .collect()
}

#[test]
fn empty_search_keeps_every_record() {
    let spas = sample_spas();
    let view = apply_query(&spas, &QueryState::default());
    assert_eq!(view.len(), spas.len());
}

#[test]
fn every_search_hit_contains_the_term() {
    let spas = sample_spas();
    let state = QueryState {
        search: "GARDEN".to_string(),
        ..Default::default()
    };
    let view = apply_query(&spas, &state);
    assert_eq!(view.len(), 2);
    for record in &view {
        assert!(record.name.to_lowercase().contains("garden"));
    }
}

#[test]
fn name_sort_orders_matches_alphabetically() {
    let spas = sample_spas();
    let state = QueryState {
        search: "spa".to_string(),
        sort: SortKey::Name,
        ..Default::default()
    };
    let names: Vec<_> = apply_query(&spas, &state)
        .iter()
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(names, vec!["Blue Lagoon Spa", "Zen Garden Spa"]);
}

#[test]
fn price_sort_keeps_arrival_order_on_ties() {
    let spas = sample_spas();
    let state = QueryState {
        sort: SortKey::PriceAsc,
        ..Default::default()
    };
    let ids: Vec<_> = apply_query(&spas, &state).iter().map(|s| &s.id).collect();
    // s2 and s3 share a price; s2 arrived first and must stay first.
    assert_eq!(ids, vec!["s5", "s2", "s3", "s1", "s4"]);
}

#[test]
fn reapplying_a_query_to_its_own_view_changes_nothing() {
    let spas = sample_spas();
    let state = QueryState {
        search: "a".to_string(),
        sort: SortKey::PriceDesc,
        ..Default::default()
    };
    let view = apply_query(&spas, &state);
    let again = apply_query(&view, &state);
    let first: Vec<_> = view.iter().map(|s| &s.id).collect();
    let second: Vec<_> = again.iter().map(|s| &s.id).collect();
    assert_eq!(first, second);
}

#[test]
fn discounted_filter_combines_with_search() {
    let spas = sample_spas();
    let mut state = QueryState {
        search: "spa".to_string(),
        ..Default::default()
    };
    state.filters.insert(FilterFlag::Discounted);
    // "spa" alone matches s1 and s4; only s1 carries a discount.
    let view = apply_query(&spas, &state);
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id, "s1");
    assert!(view[0].discount > 0.0);
}

#[test]
fn pages_partition_the_whole_view() {
    let bookings = sample_bookings(23);
    let view: Vec<&Booking> = bookings.iter().collect();

    let mut seen = Vec::new();
    for page_no in 1..=3 {
        let page = page::paginate(&view, page_no, 10);
        assert_eq!(page.total_pages, 3);
        seen.extend(page.items.iter().map(|b| b.id.clone()));
    }

    let all: Vec<_> = view.iter().map(|b| b.id.clone()).collect();
    assert_eq!(seen, all);
}

#[test]
fn last_short_page_reports_its_real_range() {
    let bookings = sample_bookings(23);
    let view: Vec<&Booking> = bookings.iter().collect();
    let page = page::paginate(&view, 3, 10);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.range_start, 21);
    assert_eq!(page.range_end, 23);
    assert_eq!(page.total, 23);
}

#[test]
fn boundary_navigation_clamps_but_jump_does_not() {
    let mut view: ListView<Booking> = ListView::new(10).unwrap();
    view.load(sample_bookings(23), 0);

    view.navigate(PageRequest::Last).unwrap();
    assert_eq!(view.page(), 3);
    view.navigate(PageRequest::Next).unwrap();
    assert_eq!(view.page(), 3);

    assert!(view.navigate(PageRequest::Jump(9)).is_err());
    assert_eq!(view.page(), 3);
}

#[test]
fn export_always_covers_the_full_filtered_view() {
    let bookings = sample_bookings(23);
    let view: Vec<&Booking> = bookings.iter().collect();

    let rows = export::to_rows(&view);
    assert_eq!(rows.len(), 23);

    let csv = export::render(&view, ExportFormat::Csv).unwrap();
    let text = String::from_utf8(csv).unwrap();
    assert_eq!(text.lines().count(), 24);
    assert!(text.lines().next().unwrap().contains("Customer Name"));
}

#[test]
fn json_export_round_trips_as_an_array() {
    let spas = sample_spas();
    let state = QueryState {
        search: "spa".to_string(),
        ..Default::default()
    };
    let view = apply_query(&spas, &state);
    let bytes = export::render(&view, ExportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value.as_array().map(|a| a.len()), Some(view.len()));
}

#[test]
fn table_export_carries_every_header() {
    let spas = sample_spas();
    let view = apply_query(&spas, &QueryState::default());
    let bytes = export::render(&view, ExportFormat::Table).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    for column in Spa::headers() {
        assert!(text.contains(column), "missing column {column}");
    }
}

#[tokio::test]
async fn fetch_gives_up_after_the_final_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(500))
        .expect(u64::from(MAX_FETCH_ATTEMPTS))
        .mount(&server)
        .await;

    let client = ApiClient::new(&server.uri(), Session::new(Some("tok".to_string())), 5).unwrap();
    let policy = FetchPolicy {
        max_attempts: MAX_FETCH_ATTEMPTS,
        backoff: false,
    };
    let mut state = FetchState::Idle;
    let result = client
        .fetch_all_with_retry::<Booking>(Collection::Bookings, policy, &mut state, None)
        .await;

    assert!(result.is_err());
    assert_eq!(state, FetchState::Failed);
}

#[tokio::test]
async fn confirmed_delete_removes_the_record_and_clamps_the_page() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/bookings/b21"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "deleted" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&server.uri(), Session::new(Some("tok".to_string())), 5).unwrap();
    let mut view: ListView<Booking> = ListView::new(10).unwrap();
    view.load(sample_bookings(21), 0);
    view.navigate(PageRequest::Last).unwrap();
    assert_eq!(view.page(), 3);

    assert!(view.try_begin_action("b21"));
    client.delete(Collection::Bookings, "b21").await.unwrap();
    assert!(view.apply_delete("b21").is_some());
    view.finish_action("b21");

    assert_eq!(view.store().len(), 20);
    assert_eq!(view.page(), 2);
    assert!(!view.action_in_flight("b21"));
}

#[tokio::test]
async fn declined_delete_never_reaches_the_service() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut view: ListView<Booking> = ListView::new(10).unwrap();
    view.load(sample_bookings(5), 0);

    assert!(view.try_begin_action("b3"));
    // Operator answered no: release the guard without calling the service.
    view.finish_action("b3");

    assert_eq!(view.store().len(), 5);
    assert!(view.store().contains("b3"));
}

#[tokio::test]
async fn login_token_authorizes_the_next_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "loginId": "admin@spa.test",
            "password": "hunter2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-fresh",
            "data": { "email": "admin@spa.test" },
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spas"))
        .and(header("authorization", "Bearer tok-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "_id": "s1", "name": "Zen Garden Spa" }],
        })))
        .mount(&server)
        .await;

    let anon = ApiClient::new(&server.uri(), Session::new(None), 5).unwrap();
    let token = anon.login("admin@spa.test", "hunter2").await.unwrap();
    assert_eq!(token, "tok-fresh");

    let client = ApiClient::new(&server.uri(), Session::new(Some(token)), 5).unwrap();
    let batch = client.fetch_all::<Spa>(Collection::Spas).await.unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].id, "s1");
}

#[test]
fn stored_token_keeps_the_rest_of_the_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "api_url: http://spa.test/api/v1\npage_size: 25\n").unwrap();

    crate::config::store_token(&path, "tok-fresh").unwrap();

    let cfg = crate::config::load_config(&path, false).unwrap();
    assert_eq!(cfg.token.as_deref(), Some("tok-fresh"));
    assert_eq!(cfg.api_url.as_deref(), Some("http://spa.test/api/v1"));
    assert_eq!(cfg.page_size, Some(25));
}

#[test]
fn seeded_default_config_parses_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");

    crate::config::ensure_default_config_file(&path).unwrap();
    let cfg = crate::config::load_config(&path, false).unwrap();

    assert_eq!(cfg.api_url.as_deref(), Some("http://localhost:5000/api/v1"));
    assert_eq!(cfg.token, None);
    assert_eq!(cfg.max_retries, Some(13));
    assert_eq!(cfg.retry_backoff, Some(true));
    assert_eq!(cfg.page_size, Some(10));

    // Seeding twice must not clobber an existing file.
    crate::config::store_token(&path, "tok").unwrap();
    crate::config::ensure_default_config_file(&path).unwrap();
    let cfg = crate::config::load_config(&path, false).unwrap();
    assert_eq!(cfg.token.as_deref(), Some("tok"));
}
