//! courier-core
//!
//! Core of a multi-tenant outbound-messaging gateway.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, instance, history sync, queue event, address, errors）
//! - **ports**: 抽象化レイヤー（MessageStore, InstanceStore, HistorySyncStore, DeliveryQueue,
//!   SessionGateway / TransportSession, HistorySyncProcessor, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（resolver, dispatch, outbox, recovery, history sync, builder）
//! - **impls**: 実装（InMemory のストアとキューなど開発用）
//! - **config**: GatewayConfig（serde + 起動時検証）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
