diesel::table! {
    utilisateurs (id) {
        id -> Integer,
        email -> Text,
        password_hash -> Text,
        phone -> Nullable<Text>,
        is_admin -> Bool,
        created_at -> Timestamp,
    }
}

diesel::table! {
    producteurs (id) {
        id -> Integer,
        name -> Text,
        email -> Text,
        city -> Text,
        address -> Nullable<Text>,
        description -> Nullable<Text>,
        phone -> Nullable<Text>,
        website -> Nullable<Text>,
        latitude -> Nullable<Double>,
        longitude -> Nullable<Double>,
        user_id -> Nullable<Integer>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    demandes_producteur (id) {
        id -> Integer,
        user_id -> Integer,
        farm_name -> Text,
        email -> Text,
        city -> Text,
        phone -> Nullable<Text>,
        description -> Nullable<Text>,
        status -> Text,
        created_at -> Timestamp,
        reviewed_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    photos_producteurs (id) {
        id -> Integer,
        producer_id -> Integer,
        url -> Text,
        caption -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    statistiques (producer_id) {
        producer_id -> Integer,
        profile_views -> Integer,
        contact_clicks -> Integer,
        map_clicks -> Integer,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    subscriptions (producer_id) {
        producer_id -> Integer,
        plan -> Text,
        status -> Text,
        stripe_customer_id -> Nullable<Text>,
        stripe_subscription_id -> Nullable<Text>,
        current_period_end -> Nullable<Timestamp>,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    reset_tokens (token) {
        token -> Text,
        user_id -> Integer,
        expires_at -> Timestamp,
        used -> Bool,
    }
}

diesel::table! {
    favoris (user_id, producer_id) {
        user_id -> Integer,
        producer_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::joinable!(producteurs -> utilisateurs (user_id));
diesel::joinable!(demandes_producteur -> utilisateurs (user_id));
diesel::joinable!(photos_producteurs -> producteurs (producer_id));
diesel::joinable!(statistiques -> producteurs (producer_id));
diesel::joinable!(subscriptions -> producteurs (producer_id));
diesel::joinable!(reset_tokens -> utilisateurs (user_id));
diesel::joinable!(favoris -> producteurs (producer_id));
diesel::joinable!(favoris -> utilisateurs (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    utilisateurs,
    producteurs,
    demandes_producteur,
    photos_producteurs,
    statistiques,
    subscriptions,
    reset_tokens,
    favoris,
);
