//! Technology topics recognised by evidence patterns.
//!
//! Each topic becomes at most one inferred decision, however many files mention it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    Datastore,
    Cache,
    Messaging,
    WebFramework,
    Api,
    Container,
    Orchestration,
    InfrastructureAsCode,
    Auth,
    Observability,
    Runtime,
    Frontend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Dependency manifests (`Cargo.toml`, `package.json`, ...).
    Manifest,
    /// Files classified as code.
    Code,
    /// Dockerfiles, compose files, Terraform and other infrastructure files.
    Infra,
    /// Config files (YAML/JSON/TOML/properties), manifests included.
    Config,
}

#[derive(Debug, Clone, Copy)]
pub struct EvidencePattern {
    pub scope: Scope,
    pub name: &'static str,
    pub regex: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Topic {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: TopicKind,
    pub title: &'static str,
    pub context: &'static str,
    pub decision: &'static str,
    pub alternatives: &'static [&'static str],
    pub positive: &'static [&'static str],
    pub negative: &'static [&'static str],
    pub keywords: &'static [&'static str],
    pub patterns: &'static [EvidencePattern],
}

pub const MANIFEST_NAMES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "Pipfile",
    "setup.py",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "Gemfile",
    "composer.json",
];

const fn manifest(name: &'static str, regex: &'static str) -> EvidencePattern {
    EvidencePattern {
        scope: Scope::Manifest,
        name,
        regex,
    }
}

const fn code(name: &'static str, regex: &'static str) -> EvidencePattern {
    EvidencePattern {
        scope: Scope::Code,
        name,
        regex,
    }
}

const fn infra(name: &'static str, regex: &'static str) -> EvidencePattern {
    EvidencePattern {
        scope: Scope::Infra,
        name,
        regex,
    }
}

const fn config(name: &'static str, regex: &'static str) -> EvidencePattern {
    EvidencePattern {
        scope: Scope::Config,
        name,
        regex,
    }
}

pub const TOPICS: &[Topic] = &[
    Topic {
        key: "postgresql",
        label: "PostgreSQL",
        kind: TopicKind::Datastore,
        title: "Use PostgreSQL as the relational datastore",
        context: "The system persists relational data and needs transactional guarantees.",
        decision: "Store relational data in PostgreSQL.",
        alternatives: &["MySQL", "SQLite", "MongoDB"],
        positive: &["Mature transactional engine with rich SQL and indexing"],
        negative: &["Requires operating and upgrading a database server"],
        keywords: &["postgresql", "postgres"],
        patterns: &[
            manifest("postgres-driver", r#"(?mi)^\s*"?(tokio-postgres|postgres|psycopg2?(-binary)?|asyncpg|pg|org\.postgresql)\b"#),
            manifest("sqlx-postgres", r#"(?i)sqlx.*postgres"#),
            code("postgres-url", r#"postgres(ql)?://"#),
            infra("postgres-image", r#"(?i)image:\s*["']?postgres"#),
            infra("postgres-rds", r#"(?i)engine\s*=\s*"(aurora-)?postgres"#),
            config("postgres-url", r#"postgres(ql)?://"#),
        ],
    },
    Topic {
        key: "mysql",
        label: "MySQL",
        kind: TopicKind::Datastore,
        title: "Use MySQL as the relational datastore",
        context: "The system persists relational data in a SQL database.",
        decision: "Store relational data in MySQL.",
        alternatives: &["PostgreSQL", "MariaDB"],
        positive: &["Widely hosted and well understood"],
        negative: &["Weaker support for advanced SQL features than some alternatives"],
        keywords: &["mysql"],
        patterns: &[
            manifest("mysql-driver", r#"(?mi)^\s*"?(mysql|mysql2|mysqlclient|pymysql|mysql-connector(-java|-python)?)\b"#),
            code("mysql-url", r#"mysql://"#),
            infra("mysql-image", r#"(?i)image:\s*["']?(mysql|mariadb)"#),
            config("mysql-url", r#"mysql://"#),
        ],
    },
    Topic {
        key: "mongodb",
        label: "MongoDB",
        kind: TopicKind::Datastore,
        title: "Use MongoDB as the document store",
        context: "The system stores schemaless or document-shaped data.",
        decision: "Persist documents in MongoDB.",
        alternatives: &["PostgreSQL with JSONB", "DynamoDB"],
        positive: &["Flexible schema for evolving documents"],
        negative: &["Multi-document transactions and joins are limited"],
        keywords: &["mongodb", "mongo"],
        patterns: &[
            manifest("mongo-driver", r#"(?mi)^\s*"?(mongodb|mongoose|pymongo|motor|mongo-driver)\b"#),
            code("mongo-url", r#"mongodb(\+srv)?://"#),
            infra("mongo-image", r#"(?i)image:\s*["']?mongo"#),
        ],
    },
    Topic {
        key: "redis",
        label: "Redis",
        kind: TopicKind::Cache,
        title: "Use Redis for caching and ephemeral state",
        context: "Hot data and ephemeral state need low-latency access outside the primary store.",
        decision: "Cache hot data and ephemeral state in Redis.",
        alternatives: &["Memcached", "In-process cache"],
        positive: &["Sub-millisecond reads and rich data structures"],
        negative: &["Another stateful service to operate; cache invalidation complexity"],
        keywords: &["redis"],
        patterns: &[
            manifest("redis-client", r#"(?mi)^\s*"?(redis|ioredis|redis-py|aioredis|jedis|lettuce)\b"#),
            code("redis-url", r#"rediss?://"#),
            infra("redis-image", r#"(?i)image:\s*["']?redis"#),
            infra("redis-elasticache", r#"aws_elasticache_cluster"#),
        ],
    },
    Topic {
        key: "sqlite",
        label: "SQLite",
        kind: TopicKind::Datastore,
        title: "Use SQLite as an embedded database",
        context: "Local persistence is needed without running a separate database server.",
        decision: "Persist local data in an embedded SQLite database.",
        alternatives: &["PostgreSQL", "Flat files"],
        positive: &["Zero-ops embedded storage"],
        negative: &["Single-writer concurrency limits"],
        keywords: &["sqlite"],
        patterns: &[
            manifest("sqlite-driver", r#"(?mi)^\s*"?(rusqlite|sqlite3|better-sqlite3|sqlite)\b"#),
            code("sqlite-url", r#"sqlite://|sqlite3\.connect\("#),
        ],
    },
    Topic {
        key: "kafka",
        label: "Kafka",
        kind: TopicKind::Messaging,
        title: "Use Kafka for event streaming",
        context: "Components exchange events asynchronously and need durable, replayable streams.",
        decision: "Publish and consume domain events through Kafka topics.",
        alternatives: &["RabbitMQ", "Amazon SQS", "NATS"],
        positive: &["Durable, partitioned, replayable event log"],
        negative: &["Operationally heavy; consumers must handle ordering and idempotency"],
        keywords: &["kafka"],
        patterns: &[
            manifest("kafka-client", r#"(?mi)^\s*"?(rdkafka|kafkajs|kafka-python|confluent-kafka|spring-kafka|sarama)\b"#),
            infra("kafka-image", r#"(?i)image:\s*["']?(confluentinc/cp-kafka|bitnami/kafka|apache/kafka)"#),
            infra("msk-cluster", r#"aws_msk_cluster"#),
        ],
    },
    Topic {
        key: "rabbitmq",
        label: "RabbitMQ",
        kind: TopicKind::Messaging,
        title: "Use RabbitMQ for asynchronous messaging",
        context: "Work is dispatched asynchronously between components.",
        decision: "Route asynchronous messages through RabbitMQ queues.",
        alternatives: &["Kafka", "Redis streams"],
        positive: &["Flexible routing with acknowledgements"],
        negative: &["Broker availability becomes critical path"],
        keywords: &["rabbitmq", "amqp"],
        patterns: &[
            manifest("amqp-client", r#"(?mi)^\s*"?(lapin|amqplib|pika|aio-pika|spring-boot-starter-amqp)\b"#),
            code("amqp-url", r#"amqps?://"#),
            infra("rabbit-image", r#"(?i)image:\s*["']?rabbitmq"#),
        ],
    },
    Topic {
        key: "graphql",
        label: "GraphQL",
        kind: TopicKind::Api,
        title: "Expose a GraphQL API",
        context: "Clients need flexible, typed queries over the domain model.",
        decision: "Serve the public API through a GraphQL schema.",
        alternatives: &["REST", "gRPC"],
        positive: &["Clients fetch exactly the fields they need"],
        negative: &["Query cost control and caching are harder than REST"],
        keywords: &["graphql"],
        patterns: &[
            manifest("graphql-server", r#"(?mi)^\s*"?(async-graphql|juniper|graphql|apollo-server|@apollo/server|graphene|strawberry-graphql)\b"#),
            config("graphql-schema", r#"(?m)^\s*type\s+Query\s*\{"#),
        ],
    },
    Topic {
        key: "grpc",
        label: "gRPC",
        kind: TopicKind::Api,
        title: "Use gRPC for service-to-service communication",
        context: "Services call each other with strongly typed contracts.",
        decision: "Define service contracts in Protocol Buffers and communicate over gRPC.",
        alternatives: &["REST/JSON", "GraphQL"],
        positive: &["Typed contracts and efficient binary transport"],
        negative: &["Harder to debug and call from browsers"],
        keywords: &["grpc", "protobuf"],
        patterns: &[
            manifest("grpc-lib", r#"(?mi)^\s*"?(tonic|grpcio|@grpc/grpc-js|grpc)\b"#),
            config("proto-service", r#"(?m)^\s*service\s+\w+\s*\{"#),
        ],
    },
    Topic {
        key: "axum",
        label: "axum",
        kind: TopicKind::WebFramework,
        title: "Build HTTP services with axum",
        context: "The Rust services expose HTTP endpoints.",
        decision: "Implement HTTP handlers with the axum framework on tokio.",
        alternatives: &["actix-web", "warp", "rocket"],
        positive: &["Tower middleware ecosystem and tokio integration"],
        negative: &["Ties handlers to tokio and tower abstractions"],
        keywords: &["axum"],
        patterns: &[
            manifest("axum-dep", r#"(?m)^\s*axum\s*="#),
            code("axum-router", r#"axum::(Router|routing)"#),
        ],
    },
    Topic {
        key: "actix-web",
        label: "actix-web",
        kind: TopicKind::WebFramework,
        title: "Build HTTP services with actix-web",
        context: "The Rust services expose HTTP endpoints.",
        decision: "Implement HTTP handlers with actix-web.",
        alternatives: &["axum", "rocket"],
        positive: &["High throughput actor-based runtime"],
        negative: &["Framework-specific extractors and runtime"],
        keywords: &["actix"],
        patterns: &[
            manifest("actix-dep", r#"(?m)^\s*actix-web\s*="#),
            code("actix-app", r#"actix_web::"#),
        ],
    },
    Topic {
        key: "express",
        label: "Express",
        kind: TopicKind::WebFramework,
        title: "Build HTTP services with Express",
        context: "The Node.js services expose HTTP endpoints.",
        decision: "Implement HTTP routes with Express.",
        alternatives: &["Fastify", "NestJS", "Koa"],
        positive: &["Minimal and ubiquitous middleware model"],
        negative: &["Little structure; conventions must be enforced by the team"],
        keywords: &["express"],
        patterns: &[
            manifest("express-dep", r#""express"\s*:"#),
            code("express-app", r#"require\(["']express["']\)|from\s+["']express["']"#),
        ],
    },
    Topic {
        key: "fastapi",
        label: "FastAPI",
        kind: TopicKind::WebFramework,
        title: "Build HTTP services with FastAPI",
        context: "The Python services expose typed HTTP endpoints.",
        decision: "Implement HTTP endpoints with FastAPI and pydantic models.",
        alternatives: &["Flask", "Django REST framework"],
        positive: &["Type-driven validation and generated OpenAPI docs"],
        negative: &["Async code paths require async-aware libraries"],
        keywords: &["fastapi"],
        patterns: &[
            manifest("fastapi-dep", r#"(?mi)^\s*"?fastapi\b"#),
            code("fastapi-app", r#"from\s+fastapi\s+import|FastAPI\("#),
        ],
    },
    Topic {
        key: "django",
        label: "Django",
        kind: TopicKind::WebFramework,
        title: "Build the web application with Django",
        context: "The Python application needs an ORM, admin and web layer.",
        decision: "Use Django for the web layer and ORM.",
        alternatives: &["Flask", "FastAPI"],
        positive: &["Batteries included: ORM, migrations, admin"],
        negative: &["Monolithic conventions are hard to split later"],
        keywords: &["django"],
        patterns: &[
            manifest("django-dep", r#"(?mi)^\s*"?django\b"#),
            code("django-import", r#"from\s+django(\.\w+)*\s+import"#),
        ],
    },
    Topic {
        key: "flask",
        label: "Flask",
        kind: TopicKind::WebFramework,
        title: "Build HTTP services with Flask",
        context: "The Python services expose HTTP endpoints.",
        decision: "Implement HTTP endpoints with Flask.",
        alternatives: &["FastAPI", "Django"],
        positive: &["Small, flexible microframework"],
        negative: &["Validation, auth and structure are left to extensions"],
        keywords: &["flask"],
        patterns: &[
            manifest("flask-dep", r#"(?mi)^\s*"?flask\b"#),
            code("flask-app", r#"from\s+flask\s+import|Flask\(__name__\)"#),
        ],
    },
    Topic {
        key: "spring-boot",
        label: "Spring Boot",
        kind: TopicKind::WebFramework,
        title: "Build services on Spring Boot",
        context: "The JVM services need dependency injection and a web layer.",
        decision: "Build services with Spring Boot starters.",
        alternatives: &["Quarkus", "Micronaut"],
        positive: &["Large ecosystem and auto-configuration"],
        negative: &["Heavy startup and implicit configuration"],
        keywords: &["spring"],
        patterns: &[
            manifest("spring-boot-dep", r#"spring-boot"#),
            code("spring-annotation", r#"@SpringBootApplication|@RestController"#),
        ],
    },
    Topic {
        key: "docker",
        label: "Docker",
        kind: TopicKind::Container,
        title: "Package services as Docker containers",
        context: "Services must run identically across development and production.",
        decision: "Build and ship each service as a Docker image.",
        alternatives: &["Native packages", "Buildpacks"],
        positive: &["Reproducible runtime environments"],
        negative: &["Image supply-chain and base image patching become our job"],
        keywords: &["docker", "container", "containers"],
        patterns: &[
            infra("dockerfile", r#"(?m)^\s*FROM\s+\S+"#),
            infra("compose-services", r#"(?m)^services:\s*$"#),
        ],
    },
    Topic {
        key: "kubernetes",
        label: "Kubernetes",
        kind: TopicKind::Orchestration,
        title: "Deploy workloads on Kubernetes",
        context: "Containerised services need scheduling, scaling and service discovery.",
        decision: "Deploy and operate workloads on Kubernetes.",
        alternatives: &["Docker Compose", "Amazon ECS", "Nomad"],
        positive: &["Declarative deployments with self-healing"],
        negative: &["Significant operational and conceptual overhead"],
        keywords: &["kubernetes", "k8s"],
        patterns: &[
            config("k8s-manifest", r#"(?m)^kind:\s*(Deployment|StatefulSet|DaemonSet|Ingress|CronJob)\s*$"#),
            config("helm-chart", r#"(?m)^apiVersion:\s*v2\s*$"#),
            infra("eks-cluster", r#"aws_eks_cluster|google_container_cluster|azurerm_kubernetes_cluster"#),
        ],
    },
    Topic {
        key: "terraform",
        label: "Terraform",
        kind: TopicKind::InfrastructureAsCode,
        title: "Manage infrastructure with Terraform",
        context: "Cloud infrastructure must be reproducible and reviewable.",
        decision: "Declare infrastructure as code with Terraform.",
        alternatives: &["Pulumi", "CloudFormation", "Manual provisioning"],
        positive: &["Reviewable, repeatable infrastructure changes"],
        negative: &["State files must be stored and locked safely"],
        keywords: &["terraform", "infrastructure"],
        patterns: &[
            infra("tf-resource", r#"(?m)^\s*resource\s+"\w+"\s+"\w+""#),
            infra("tf-provider", r#"(?m)^\s*provider\s+"\w+""#),
        ],
    },
    Topic {
        key: "jwt-auth",
        label: "JWT",
        kind: TopicKind::Auth,
        title: "Authenticate requests with JSON Web Tokens",
        context: "API callers must be authenticated without server-side sessions.",
        decision: "Issue and verify signed JWTs for request authentication.",
        alternatives: &["Server-side sessions", "Opaque tokens with introspection"],
        positive: &["Stateless verification at every service"],
        negative: &["Revocation and key rotation need extra machinery"],
        keywords: &["jwt", "token", "tokens"],
        patterns: &[
            manifest("jwt-lib", r#"(?mi)^\s*"?(jsonwebtoken|pyjwt|jose|python-jose|jjwt|golang-jwt)\b"#),
            code("jwt-usage", r#"(?i)\bjwt\.(sign|verify|decode|encode)\(|jsonwebtoken::"#),
        ],
    },
    Topic {
        key: "oauth",
        label: "OAuth 2.0 / OIDC",
        kind: TopicKind::Auth,
        title: "Delegate identity to an OAuth 2.0 / OpenID Connect provider",
        context: "Users sign in through an external identity provider.",
        decision: "Authenticate users via OAuth 2.0 / OIDC flows.",
        alternatives: &["Local username/password accounts"],
        positive: &["No password storage; SSO support"],
        negative: &["Dependency on an external identity provider"],
        keywords: &["oauth", "oidc", "openid"],
        patterns: &[
            manifest("oauth-lib", r#"(?mi)^\s*"?(oauth2|openidconnect|passport-oauth2|authlib|next-auth|spring-boot-starter-oauth2-client)\b"#),
            code("oidc-discovery", r#"\.well-known/openid-configuration"#),
        ],
    },
    Topic {
        key: "observability",
        label: "OpenTelemetry / Prometheus",
        kind: TopicKind::Observability,
        title: "Instrument services with OpenTelemetry and Prometheus metrics",
        context: "Operators need traces and metrics to diagnose production behaviour.",
        decision: "Export traces and metrics through OpenTelemetry and Prometheus.",
        alternatives: &["Vendor-specific APM agents", "Logs only"],
        positive: &["Vendor-neutral telemetry pipeline"],
        negative: &["Instrumentation overhead and cardinality management"],
        keywords: &["opentelemetry", "prometheus", "telemetry", "metrics"],
        patterns: &[
            manifest("otel-lib", r#"(?mi)^\s*"?(opentelemetry[\w-]*|@opentelemetry/[\w-]+|prometheus(_client|-client)?|prom-client)\b"#),
            code("metrics-endpoint", r#"["']/metrics["']"#),
        ],
    },
    Topic {
        key: "tokio",
        label: "tokio",
        kind: TopicKind::Runtime,
        title: "Use tokio as the async runtime",
        context: "The Rust code performs concurrent network and file I/O.",
        decision: "Run async code on the tokio multi-threaded runtime.",
        alternatives: &["async-std", "Blocking threads"],
        positive: &["De-facto standard runtime with broad ecosystem support"],
        negative: &["Blocking calls inside async tasks stall the executor"],
        keywords: &["tokio", "async"],
        patterns: &[
            manifest("tokio-dep", r#"(?m)^\s*tokio\s*="#),
            code("tokio-main", r#"#\[tokio::(main|test)"#),
        ],
    },
    Topic {
        key: "react",
        label: "React",
        kind: TopicKind::Frontend,
        title: "Build the user interface with React",
        context: "The product has an interactive browser front end.",
        decision: "Implement the front end as React components.",
        alternatives: &["Vue", "Svelte", "Server-rendered templates"],
        positive: &["Large component ecosystem"],
        negative: &["Client bundle size and state management complexity"],
        keywords: &["react"],
        patterns: &[
            manifest("react-dep", r#""react"\s*:"#),
            code("react-import", r#"from\s+["']react["']"#),
        ],
    },
];

pub fn topic(key: &str) -> Option<&'static Topic> {
    TOPICS.iter().find(|t| t.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn topic_keys_are_unique_and_patterns_compile() {
        let mut seen = HashSet::new();
        for topic in TOPICS {
            assert!(seen.insert(topic.key), "duplicate topic {}", topic.key);
            assert!(!topic.keywords.is_empty(), "{} has no keywords", topic.key);
            for pattern in topic.patterns {
                assert!(
                    regex::Regex::new(pattern.regex).is_ok(),
                    "bad regex {} in {}",
                    pattern.name,
                    topic.key
                );
            }
        }
    }
}
