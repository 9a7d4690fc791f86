// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod fetch_executor;
pub mod http_client;
pub mod pagination;
pub mod path_resolver;
pub mod random_probe;
pub mod request_builder;
pub mod response_parser;
pub mod router;
