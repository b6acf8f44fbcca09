//! Merkle construction and proof vectors over known transaction sets.

use subtree::{
    build_merkle_tree_store, hash256_pair, merkle_proof_for_coinbase, Subtree, SubtreeError,
    SubtreeNode, TxHash, ZERO_HASH,
};

fn h(s: &str) -> TxHash {
    TxHash::from_hex(s).unwrap()
}

fn leaves(ids: &[&str]) -> Vec<SubtreeNode> {
    ids.iter()
        .map(|id| SubtreeNode {
            hash: h(id),
            fee: 111,
            size_in_bytes: 0,
        })
        .collect()
}

const FOUR_TXIDS: [&str; 4] = [
    "97af9ad3583e2f83fc1e44e475e3a3ee31ec032449cc88b491479ef7d187c115",
    "7ce05dda56bc523048186c0f0474eb21c92fe35de6d014bd016834637a3ed08d",
    "3070fb937289e24720c827cbc24f3fce5c361cd7e174392a700a9f42051609e0",
    "d3cde0ab7142cc99acb31c5b5e1e941faed1c5cf5f8b63ed663972845d663487",
];

const SIX_TXIDS: [&str; 6] = [
    "4634057867994ae379e82b408cc9eb145a6e921b95ca38f2ced7eb880685a290",
    "7f87fe1100963977975cef49344e442b4fa3dd9d41de19bc94609c100210ca05",
    "a28c1021f07263101f5a5052c6a7bdc970ac1d0ab09d8d20aa7a4a61ad9d6597",
    "dcd31c71368f757f65105d68ee1a2e5598db84900e28dabecba23651c5cda468",
    "7bac32882547cbb540914f48c6ac99ac682ef001c3aa3d4dcdb5951c8db79678",
    "67c0f4eb336057ecdf940497a75fcbd1a131e981edf568b54eed2f944889e441",
];

#[test]
fn test_four_leaf_root() {
    let st = Subtree::new(2).unwrap();
    assert_eq!(st.capacity(), 4);
    for id in FOUR_TXIDS {
        st.add_node(h(id), 111, 0).unwrap();
    }
    assert_eq!(
        st.root_hash().unwrap().to_string(),
        "b47df6aa4fe0a1d3841c635444be4e33eb8cdc2f2e929ced06d0a8454fb28225"
    );
}

#[test]
fn test_block_100000_root() {
    let st = Subtree::new(2).unwrap();
    for id in [
        "8c14f0db3df150123e6f3dbbf30f8b955a8249b62ac1d1ff16284aefa3d06d87",
        "fff2525b8931402dd09222c50775608f75787bd2b87e56995a7bdd30f79702c4",
        "6359f0868171b1d194cbee1af2f16ea598ae8fad666d9b012c8ed2b79a236ec4",
        "e9a66845e05d5abc0ad04ec80f774a7e585c6e8db975962d069a522137b80c1d",
    ] {
        st.add_node(h(id), 111, 0).unwrap();
    }
    assert_eq!(
        st.root_hash().unwrap().to_string(),
        "f3e94742aca4b5ef85488dc37c06c3282295ffec960994b2c0d5ac2a25a95766"
    );
}

#[test]
fn test_two_leaf_root() {
    let st = Subtree::new(1).unwrap();
    assert_eq!(st.capacity(), 2);
    st.add_node(
        h("de2c2e8628ab837ceff3de0217083d9d5feb71f758a5d083ada0b33a36e1b30e"),
        111,
        0,
    )
    .unwrap();
    st.add_node(
        h("89878bfd69fba52876e5217faec126fc6a20b1845865d4038c12f03200793f48"),
        111,
        0,
    )
    .unwrap();
    assert_eq!(
        st.root_hash().unwrap().to_string(),
        "7a059188283323a2ef0e02dd9f8ba1ac550f94646290d0a52a586e5426c956c5"
    );
}

#[test]
fn test_six_leaf_proofs() {
    let st = Subtree::new(3).unwrap();
    assert_eq!(st.capacity(), 8);
    for id in SIX_TXIDS {
        st.add_node(h(id), 101, 0).unwrap();
    }

    let proof = st.merkle_proof(1).unwrap();
    assert_eq!(proof.len(), 3);
    assert_eq!(proof[0], h(SIX_TXIDS[0]));
    assert_eq!(
        proof[1],
        h("a9e6413abb02b534ff5250cbabdc673480656d0e053cfd23fd010241d5e045f2")
    );
    assert_eq!(
        proof[2],
        h("63fd0f07ff87223f688d0809f46a8118f185bab04d300406513acdc8832bad5e")
    );

    let proof = st.merkle_proof(4).unwrap();
    assert_eq!(proof.len(), 3);
    assert_eq!(proof[0], h(SIX_TXIDS[5]));
    assert_eq!(
        proof[1],
        h("e2a6065233b307b77a5f73f9f27843d42e48d5e061567416b4508517ef2dd452")
    );
    assert_eq!(
        proof[2],
        h("bfd8a13a5cb1ba128319ee95e09a7e2ff67a52d0c9af8485bfffae737e32d6bf")
    );

    assert_eq!(
        st.root_hash().unwrap().to_string(),
        "68e239fc6684a224142add79ebed60569baedf667c6be03a5f8719aba44a488b"
    );

    assert!(matches!(
        st.merkle_proof(6),
        Err(SubtreeError::IndexOutOfRange { index: 6, len: 6 })
    ));
}

#[test]
fn test_replace_root_reroots() {
    let st = Subtree::new(2).unwrap();
    for id in FOUR_TXIDS {
        st.add_node(h(id), 111, 0).unwrap();
    }
    let original_root = st.root_hash().unwrap();

    let new_root = st
        .root_hash_with_replaced_root(h(FOUR_TXIDS[3]), 111, 0)
        .unwrap();
    assert_ne!(new_root, original_root);
    assert_eq!(
        new_root.to_string(),
        "dfec71cf72403643187e9e02d7c436e87251fa098cffa54d182022153da3d09a"
    );
    // the receiver is untouched
    assert_eq!(st.root_hash().unwrap(), original_root);
    assert_eq!(st.node_at(0).unwrap().hash, h(FOUR_TXIDS[0]));
}

#[test]
fn test_replace_root_on_empty_and_placeholder_trees() {
    let leaf = h(FOUR_TXIDS[0]);

    let st = Subtree::new(2).unwrap();
    assert!(st.root_hash().is_none());
    let root = st.root_hash_with_replaced_root(leaf, 111, 0).unwrap();
    assert_eq!(root, leaf);
    assert!(st.root_hash().is_none());

    let st = Subtree::new(2).unwrap();
    st.add_coinbase_placeholder().unwrap();
    assert_eq!(
        st.root_hash().unwrap().to_string(),
        "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
    );
    let root = st.root_hash_with_replaced_root(leaf, 111, 0).unwrap();
    assert_eq!(root, leaf);
}

#[test]
fn test_store_layout_complete_eight() {
    let ids = [
        "97af9ad3583e2f83fc1e44e475e3a3ee31ec032449cc88b491479ef7d187c115",
        "7ce05dda56bc523048186c0f0474eb21c92fe35de6d014bd016834637a3ed08d",
        "3070fb937289e24720c827cbc24f3fce5c361cd7e174392a700a9f42051609e0",
        "d3cde0ab7142cc99acb31c5b5e1e941faed1c5cf5f8b63ed663972845d663487",
        "87af9ad3583e2f83fc1e44e475e3a3ee31ec032449cc88b491479ef7d187c115",
        "6ce05dda56bc523048186c0f0474eb21c92fe35de6d014bd016834637a3ed08d",
        "2070fb937289e24720c827cbc24f3fce5c361cd7e174392a700a9f42051609e0",
        "c3cde0ab7142cc99acb31c5b5e1e941faed1c5cf5f8b63ed663972845d663487",
    ];
    let store = build_merkle_tree_store(&leaves(&ids)).unwrap();

    let expected = [
        "2207df31366e6fdd96a7ef3286278422c1c6dd3d74c3f85bbcfee82a8d31da25",
        "c32db78e5f8437648888713982ea3d49628dbde0b4b48857147f793b55d26f09",
        "4cfd8f882dc64dd7a123d545785bd2670c981493ea85ec058e6428cb95f04fa7",
        "0bb2f84f4071e1a04f61bb04a10dc17affcf7fd558945a3a31b1d1f0fb6ec121",
        "b47df6aa4fe0a1d3841c635444be4e33eb8cdc2f2e929ced06d0a8454fb28225",
        "1e3cfb94c292e8fc2ac692c4c4db4ea73784978ff47424668233a7f491e218a3",
        "86867b9f3e7dcb4bdf5b5cc99322122fe492bc466621f3709d4e389e7e14c16c",
    ];
    assert_eq!(store.len(), expected.len());
    for (slot, want) in store.iter().zip(expected) {
        assert_eq!(slot.to_string(), want);
    }
}

#[test]
fn test_store_layout_incomplete_six() {
    let store = build_merkle_tree_store(&leaves(&SIX_TXIDS)).unwrap();

    let expected = [
        "dc9ab938cd3124ad36e90c30bcb02256eb73eb62dc657d93e89a0a29f323c3c7",
        "a9e6413abb02b534ff5250cbabdc673480656d0e053cfd23fd010241d5e045f2",
        "e2a6065233b307b77a5f73f9f27843d42e48d5e061567416b4508517ef2dd452",
        "", // no real subtree below this slot
        "bfd8a13a5cb1ba128319ee95e09a7e2ff67a52d0c9af8485bfffae737e32d6bf",
        "63fd0f07ff87223f688d0809f46a8118f185bab04d300406513acdc8832bad5e",
        "68e239fc6684a224142add79ebed60569baedf667c6be03a5f8719aba44a488b",
    ];
    assert_eq!(store.len(), expected.len());
    for (slot, want) in store.iter().zip(expected) {
        if want.is_empty() {
            assert_eq!(*slot, ZERO_HASH);
        } else {
            assert_eq!(slot.to_string(), want);
        }
    }
}

#[test]
fn test_store_layout_incomplete_five() {
    let ids = [
        "97af9ad3583e2f83fc1e44e475e3a3ee31ec032449cc88b491479ef7d187c115",
        "7ce05dda56bc523048186c0f0474eb21c92fe35de6d014bd016834637a3ed08d",
        "3070fb937289e24720c827cbc24f3fce5c361cd7e174392a700a9f42051609e0",
        "d3cde0ab7142cc99acb31c5b5e1e941faed1c5cf5f8b63ed663972845d663487",
        "87af9ad3583e2f83fc1e44e475e3a3ee31ec032449cc88b491479ef7d187c115",
    ];
    let store = build_merkle_tree_store(&leaves(&ids)).unwrap();

    let expected = [
        "2207df31366e6fdd96a7ef3286278422c1c6dd3d74c3f85bbcfee82a8d31da25",
        "c32db78e5f8437648888713982ea3d49628dbde0b4b48857147f793b55d26f09",
        "61a34fe6c63b5276e042a10a559e9ee9bb785f7b40f753fefdf0fe615d8a6be1",
        "",
        "b47df6aa4fe0a1d3841c635444be4e33eb8cdc2f2e929ced06d0a8454fb28225",
        "95d960d5691c5a92beb94501d0f775dbc161e6fe1c6ca420e158ef22f25320cb",
        "e641bf2a1c0a2298d628ad70e25976cbda419e825eeb21d854976d6f93192a24",
    ];
    assert_eq!(store.len(), expected.len());
    for (slot, want) in store.iter().zip(expected) {
        if want.is_empty() {
            assert_eq!(*slot, ZERO_HASH);
        } else {
            assert_eq!(slot.to_string(), want);
        }
    }
}

#[test]
fn test_root_equals_last_store_element() {
    for n in 1..=9usize {
        let nodes: Vec<SubtreeNode> = SIX_TXIDS
            .iter()
            .cycle()
            .take(n)
            .enumerate()
            .map(|(i, id)| SubtreeNode {
                hash: hash256_pair(&h(id), &TxHash([i as u8; 32])),
                fee: 1,
                size_in_bytes: 1,
            })
            .collect();

        let st = Subtree::with_max_leaf_count(n.max(2)).unwrap();
        for node in &nodes {
            st.add_subtree_node(*node).unwrap();
        }

        let store = build_merkle_tree_store(&nodes).unwrap();
        assert_eq!(st.root_hash(), store.last().copied(), "n = {n}");
    }
}

#[test]
fn test_proof_composes_to_root_for_complete_trees() {
    let st = Subtree::new(2).unwrap();
    for id in FOUR_TXIDS {
        st.add_node(h(id), 111, 0).unwrap();
    }
    let root = st.root_hash().unwrap();

    for index in 0..4usize {
        let proof = st.merkle_proof(index).unwrap();
        let mut current = st.node_at(index).unwrap().hash;
        let mut position = index;
        for sibling in &proof {
            current = if position % 2 == 0 {
                hash256_pair(&current, sibling)
            } else {
                hash256_pair(sibling, &current)
            };
            position /= 2;
        }
        assert_eq!(current, root, "index {index}");
    }
}

#[test]
fn test_coinbase_proof_over_two_subtrees() {
    let subtree1 = Subtree::new(2).unwrap();
    for id in [
        "97af9ad3583e2f83fc1e44e475e3a3ee31ec032449cc88b491479ef7d187c115",
        "7ce05dda56bc523048186c0f0474eb21c92fe35de6d014bd016834637a3ed08d",
        "3070fb937289e24720c827cbc24f3fce5c361cd7e174392a700a9f42051609e0",
        "d3cde0ab7142cc99acb31c5b5e1e941faed1c5cf5f8b63ed663972845d663487",
    ] {
        subtree1.add_node(h(id), 12, 0).unwrap();
    }
    let subtree2 = Subtree::new(2).unwrap();
    for id in [
        "87af9ad3583e2f83fc1e44e475e3a3ee31ec032449cc88b491479ef7d187c115",
        "6ce05dda56bc523048186c0f0474eb21c92fe35de6d014bd016834637a3ed08d",
        "2070fb937289e24720c827cbc24f3fce5c361cd7e174392a700a9f42051609e0",
        "c3cde0ab7142cc99acb31c5b5e1e941faed1c5cf5f8b63ed663972845d663487",
    ] {
        subtree2.add_node(h(id), 16, 0).unwrap();
    }

    let proof = merkle_proof_for_coinbase(&[&subtree1, &subtree2]).unwrap();
    assert_eq!(proof.len(), 3);
    assert_eq!(
        proof[0].to_string(),
        "7ce05dda56bc523048186c0f0474eb21c92fe35de6d014bd016834637a3ed08d"
    );
    assert_eq!(
        proof[1].to_string(),
        "c32db78e5f8437648888713982ea3d49628dbde0b4b48857147f793b55d26f09"
    );
    assert_eq!(proof[2], subtree2.root_hash().unwrap());

    // composing the subtree roots in a top tree gives the block root
    let top = Subtree::with_leaf_count(2).unwrap();
    top.add_node(subtree1.root_hash().unwrap(), subtree1.fees(), 0)
        .unwrap();
    top.add_node(subtree2.root_hash().unwrap(), subtree2.fees(), 0)
        .unwrap();
    assert_eq!(
        top.root_hash().unwrap().to_string(),
        "86867b9f3e7dcb4bdf5b5cc99322122fe492bc466621f3709d4e389e7e14c16c"
    );
}

#[test]
fn test_coinbase_proof_failures() {
    let empty: Vec<&Subtree> = Vec::new();
    assert!(matches!(
        merkle_proof_for_coinbase(&empty),
        Err(SubtreeError::NoSubtrees)
    ));

    let st = Subtree::new(2).unwrap();
    assert!(merkle_proof_for_coinbase(&[&st]).is_err());
}

#[test]
fn test_large_tree_parallel_build() {
    let nodes: Vec<SubtreeNode> = (0u32..2048)
        .map(|i| SubtreeNode {
            hash: subtree::sha256(i.to_be_bytes()),
            fee: i as u64,
            size_in_bytes: i as u64 * 10,
        })
        .collect();

    let store = build_merkle_tree_store(&nodes).unwrap();
    assert_eq!(store.len(), 2047);

    // spot-check determinism against a sequential recomputation of the root
    let mut layer: Vec<TxHash> = nodes.chunks(2).map(|p| hash256_pair(&p[0].hash, &p[1].hash)).collect();
    while layer.len() > 1 {
        layer = layer.chunks(2).map(|p| hash256_pair(&p[0], &p[1])).collect();
    }
    assert_eq!(*store.last().unwrap(), layer[0]);
}
