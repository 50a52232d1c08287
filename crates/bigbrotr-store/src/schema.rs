// @generated-by-hand: kept in sync with migrations/ manually, the way `nostr-postgresdb`
// hand-maintains its schema module alongside its Diesel migrations.

diesel::table! {
    relays (url) {
        url -> Text,
        network -> Text,
        inserted_at -> BigInt,
    }
}

diesel::table! {
    events (id) {
        id -> Text,
        pubkey -> Text,
        created_at -> BigInt,
        kind -> BigInt,
        tags -> Jsonb,
        content -> Text,
        sig -> Text,
        inserted_at -> BigInt,
    }
}

diesel::table! {
    events_relays (event_id, relay_url) {
        event_id -> Text,
        relay_url -> Text,
        seen_at -> BigInt,
    }
}

diesel::table! {
    nip11_blocks (hash) {
        hash -> Text,
        data -> Jsonb,
    }
}

diesel::table! {
    nip66_blocks (hash) {
        hash -> Text,
        data -> Jsonb,
    }
}

diesel::table! {
    relay_metadata (relay_url, generated_at) {
        relay_url -> Text,
        generated_at -> BigInt,
        nip11_hash -> Nullable<Text>,
        nip66_hash -> Nullable<Text>,
    }
}

diesel::table! {
    service_state (service_name) {
        service_name -> Text,
        state -> Jsonb,
        updated_at -> BigInt,
    }
}

diesel::joinable!(events_relays -> relays (relay_url));
diesel::joinable!(events_relays -> events (event_id));
diesel::joinable!(relay_metadata -> relays (relay_url));

diesel::allow_tables_to_appear_in_same_query!(
    relays,
    events,
    events_relays,
    nip11_blocks,
    nip66_blocks,
    relay_metadata,
    service_state,
);
