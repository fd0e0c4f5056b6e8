//! Trademark index definition: Korean (nori) and n-gram analyzers, keyword
//! chosung fields and lenient date formats.

use serde_json::{json, Value};

use super::normalize::{DATE_FIELDS, PRONUNCIATION_CHOSUNG};

/// Accepted on input; the normalizer always writes `yyyy-MM-dd`.
pub const DATE_INPUT_FORMATS: &str = "yyyyMMdd||yyyy-MM-dd||strict_date_optional_time";

fn keyword_with_search() -> Value {
    json!({
        "type": "keyword",
        "fields": { "search": { "type": "text", "analyzer": "number_analyzer" } }
    })
}

fn date() -> Value {
    json!({ "type": "date", "format": DATE_INPUT_FORMATS })
}

/// Settings and mappings for the trademark index.
pub fn index_definition() -> Value {
    let mut properties = json!({
        "pid": {
            "type": "keyword",
            // Max aggregation target for the pid allocator; UUIDs are skipped.
            "fields": { "numeric": { "type": "long", "ignore_malformed": true } }
        },
        "viewCount": { "type": "integer", "null_value": 0 },

        "productName": {
            "type": "text",
            "analyzer": "nori_standard",
            "search_analyzer": "nori_search",
            "fields": {
                "keyword": { "type": "keyword", "ignore_above": 256 },
                "ngram": { "type": "text", "analyzer": "nori_ngram", "search_analyzer": "nori_search_ngram" },
                "edge_ngram": { "type": "text", "analyzer": "nori_edge_ngram", "search_analyzer": "korean_standard" },
                "no_decompound": { "type": "text", "analyzer": "nori_no_decompound" }
            }
        },
        "productName_chosung": { "type": "keyword" },
        "productNameEng": {
            "type": "text",
            "analyzer": "english_standard",
            "search_analyzer": "english_search",
            "fields": {
                "keyword": { "type": "keyword", "ignore_above": 256 },
                "ngram": { "type": "text", "analyzer": "english_ngram", "search_analyzer": "english_search_ngram" }
            }
        },
        "productNameEngPronunciation": {
            "type": "text",
            "analyzer": "nori_standard",
            "search_analyzer": "nori_search",
            "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
        },
        (PRONUNCIATION_CHOSUNG): { "type": "keyword" },

        "applicationNumber": keyword_with_search(),
        "registrationNumber": keyword_with_search(),
        "publicationNumber": { "type": "keyword" },
        "internationalRegNumbers": { "type": "keyword" },
        "priorityClaimNumList": { "type": "keyword" },

        "registerStatus": {
            "type": "keyword",
            "fields": { "text": { "type": "text", "analyzer": "korean_standard" } }
        },
        "asignProductMainCodeList": keyword_with_search(),
        "asignProductSubCodeList": keyword_with_search(),
        "viennaCodeList": { "type": "keyword" }
    });
    for field in DATE_FIELDS {
        properties[*field] = date();
    }

    json!({
        "settings": {
            "index": {
                "number_of_shards": 1,
                "number_of_replicas": 0,
                "max_ngram_diff": 9,
                "refresh_interval": "5s"
            },
            "analysis": {
                "analyzer": {
                    "nori_standard": {
                        "type": "custom",
                        "tokenizer": "nori_tokenizer_standard",
                        "filter": ["nori_readingform", "nori_part_of_speech_filter", "lowercase", "trim"]
                    },
                    "nori_search": {
                        "type": "custom",
                        "tokenizer": "nori_tokenizer_standard",
                        "filter": ["nori_readingform", "lowercase", "trim", "asciifolding"]
                    },
                    "nori_ngram": {
                        "type": "custom",
                        "tokenizer": "nori_tokenizer_standard",
                        "filter": ["lowercase", "nori_readingform", "ngram_filter"]
                    },
                    "nori_search_ngram": {
                        "type": "custom",
                        "tokenizer": "nori_tokenizer_standard",
                        "filter": ["lowercase", "nori_readingform"]
                    },
                    "nori_edge_ngram": {
                        "type": "custom",
                        "tokenizer": "nori_tokenizer_standard",
                        "filter": ["lowercase", "nori_readingform", "edge_ngram_filter"]
                    },
                    "nori_no_decompound": {
                        "type": "custom",
                        "tokenizer": "nori_tokenizer_none",
                        "filter": ["lowercase", "nori_readingform"]
                    },
                    "english_standard": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding", "trim"]
                    },
                    "english_search": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding", "trim"]
                    },
                    "english_ngram": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase", "english_ngram_filter"]
                    },
                    "english_search_ngram": {
                        "type": "custom",
                        "tokenizer": "standard",
                        "filter": ["lowercase"]
                    },
                    "number_analyzer": {
                        "type": "custom",
                        "tokenizer": "keyword",
                        "filter": ["lowercase", "trim"]
                    },
                    "korean_standard": {
                        "type": "custom",
                        "tokenizer": "nori_tokenizer_standard",
                        "filter": ["lowercase"]
                    }
                },
                "tokenizer": {
                    "nori_tokenizer_standard": { "type": "nori_tokenizer", "decompound_mode": "discard" },
                    "nori_tokenizer_none": { "type": "nori_tokenizer", "decompound_mode": "none" }
                },
                "filter": {
                    "ngram_filter": { "type": "ngram", "min_gram": 2, "max_gram": 5 },
                    "edge_ngram_filter": { "type": "edge_ngram", "min_gram": 1, "max_gram": 10 },
                    "english_ngram_filter": { "type": "ngram", "min_gram": 2, "max_gram": 10 },
                    "nori_part_of_speech_filter": {
                        "type": "nori_part_of_speech",
                        "stoptags": [
                            "E", "IC", "J", "MAG", "MAJ", "MM", "SP",
                            "SSC", "SSO", "SC", "SE", "XPN", "XSA", "XSN", "XSV"
                        ]
                    }
                }
            }
        },
        "mappings": { "properties": properties }
    })
}
