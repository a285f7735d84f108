//! Reply text spoken or texted by Sofía.
//!
//! Replies never include internal error text, field names or codes.

pub const BUSINESS_NAME: &str = "FrancisTaxService";

pub fn greeting() -> String {
    format!("Gracias por comunicarse con {BUSINESS_NAME}, le atiende Sofía. ¿Con quién tengo el gusto?")
}

pub fn introduction() -> String {
    format!("Gracias por comunicarse con {BUSINESS_NAME}, le atiende Sofía.")
}

pub fn ask_full_name() -> String {
    "Claro, con gusto le ayudo. Para empezar, ¿me podría decir su nombre completo, por favor?".to_string()
}

pub fn ask_surnames(first_name: &str) -> String {
    format!(
        "Mucho gusto, {first_name}. Para poder buscarle en el sistema, ¿me podría proporcionar sus apellidos, por favor?"
    )
}

pub fn ask_client_surnames(first_name: &str) -> String {
    format!("Gracias. ¿Me podría proporcionar los apellidos de {first_name}, por favor?")
}

pub fn ask_client_name(caller_first_name: Option<&str>) -> String {
    match caller_first_name {
        Some(name) => format!(
            "Gracias, {name}. ¿Me podría proporcionar el nombre completo del cliente al que representa, por favor?"
        ),
        None => "Entendido. ¿Me podría proporcionar el nombre completo del cliente al que representa, por favor?"
            .to_string(),
    }
}

pub fn reclassified() -> String {
    "Entendido. Entonces, el nombre que me dio antes es el suyo. ¿Me podría proporcionar el nombre completo del cliente al que representa?"
        .to_string()
}

pub fn refusal_goodbye() -> String {
    "Entiendo su postura, pero sin esa información no me es posible acceder a su cuenta de forma segura. Lamento no poder ayudarle más en este momento. Gracias por llamar."
        .to_string()
}

pub fn searching(caller_first_name: Option<&str>) -> String {
    match caller_first_name {
        Some(name) => format!(
            "Mucho gusto, {name}. Permítame un momento mientras busco la información en nuestro sistema."
        ),
        None => "Permítame un momento mientras busco la información en nuestro sistema.".to_string(),
    }
}

pub fn found_customer(first_name: &str) -> String {
    format!(
        "Perfecto, he encontrado una cuenta a su nombre, {first_name}. Por seguridad, ¿podría confirmarme su fecha de nacimiento?"
    )
}

pub fn found_for_representative(client_full_name: &str) -> String {
    format!(
        "Gracias por su espera. He localizado la cuenta de {client_full_name}. Para continuar, por seguridad, ¿podría confirmarme la fecha de nacimiento de su cliente?"
    )
}

pub fn not_found(full_name: &str) -> String {
    format!(
        "Disculpe, no he podido localizar un registro con el nombre '{full_name}'. ¿Usted es un cliente nuevo o está llamando en representación de un cliente existente?"
    )
}

pub fn not_found_for_representative(full_name: &str) -> String {
    format!(
        "Disculpe, no he podido localizar un registro con el nombre '{full_name}'. ¿Podría confirmarme el nombre completo de su cliente, o se trata de un cliente nuevo?"
    )
}

pub fn new_customer_options() -> String {
    "Entendido. ¿Le gustaría crear una cuenta con nosotros en este momento o prefiere que le brinde información sobre nuestros servicios?"
        .to_string()
}

pub fn information() -> String {
    format!(
        "Con gusto. En {BUSINESS_NAME} le ayudamos con la preparación y presentación de impuestos personales y de negocio, correspondencia del IRS y trámites relacionados.\nSi más adelante desea crear una cuenta, solo dígamelo y con gusto la preparo."
    )
}

pub fn contact_created() -> String {
    "Perfecto, he creado un perfil para usted. Ahora, para continuar, ¿en qué puedo ayudarle hoy?"
        .to_string()
}

pub fn contact_creation_failed() -> String {
    "Disculpe, no pude crear su perfil en este momento. Si me confirma, lo intento de nuevo."
        .to_string()
}

pub fn ask_dob() -> String {
    "Por seguridad, ¿podría confirmarme la fecha de nacimiento, con día, mes y año?".to_string()
}

pub fn unparseable_dob() -> String {
    "Disculpe, no logré entender la fecha. ¿Podría indicarme la fecha de nacimiento con día, mes y año? Por ejemplo, 23 de agosto de 1995."
        .to_string()
}

pub fn dob_mismatch() -> String {
    "La fecha de nacimiento no coincide con nuestros registros. ¿Podría proporcionármela de nuevo, por favor?"
        .to_string()
}

pub fn ask_dob_and_phone() -> String {
    "Parece que no podemos verificar con la fecha de nacimiento. Como método alternativo, ¿podría proporcionarme de nuevo la fecha de nacimiento y también el número de teléfono asociado a la cuenta?"
        .to_string()
}

pub fn dob_phone_mismatch() -> String {
    "Los datos no coinciden con nuestros registros. ¿Podría repetirme la fecha de nacimiento y el número de teléfono asociado a la cuenta?"
        .to_string()
}

pub fn ask_phone() -> String {
    "Gracias. ¿Y el número de teléfono asociado a la cuenta?".to_string()
}

pub fn invalid_phone() -> String {
    "Disculpe, el número de teléfono parece incompleto. ¿Podría proporcionármelo completo, incluyendo el código de área?"
        .to_string()
}

pub fn verified(first_name: Option<&str>) -> String {
    match first_name {
        Some(name) => format!(
            "¡Perfecto, {name}! La identidad ha sido verificada. Ahora, ¿en qué puedo ayudarle hoy?"
        ),
        None => "¡Perfecto! La identidad ha sido verificada. Ahora, ¿en qué puedo ayudarle hoy?"
            .to_string(),
    }
}

pub fn escalated() -> String {
    "Por su seguridad, no hemos podido verificar la identidad. Un especialista se encargará de su caso para garantizar la protección de sus datos. Por favor, espere en línea."
        .to_string()
}

pub fn ask_reason() -> String {
    "¿En qué puedo ayudarle hoy?".to_string()
}

pub fn ask_last_help_year() -> String {
    "Entendido. Para registrar correctamente su solicitud, ¿podría decirme cuál fue el último año en que le ayudamos con sus impuestos?"
        .to_string()
}

pub fn unparseable_last_help_year() -> String {
    "Disculpe, ¿me podría indicar el año? Por ejemplo, 2023, o si fue en 2017 o antes."
        .to_string()
}

pub fn ask_relationship(client_full_name: Option<&str>) -> String {
    match client_full_name {
        Some(name) => format!("Gracias. ¿Cuál es su relación o parentesco con {name}?"),
        None => "Gracias. ¿Cuál es su relación o parentesco con el cliente?".to_string(),
    }
}

pub fn case_filed() -> String {
    format!(
        "He registrado su solicitud. Gracias por llamar a {BUSINESS_NAME}. En unos momentos será atendido por otro agente que podrá seguirle dando atención a su caso. ¡Que tenga un buen día!"
    )
}

pub fn already_filed() -> String {
    "Su solicitud ya quedó registrada. En unos momentos será atendido por otro agente.".to_string()
}

pub fn already_escalated() -> String {
    "Un especialista se encargará de su caso en breve. Gracias por su paciencia.".to_string()
}

pub fn conversation_closed() -> String {
    format!("Gracias por comunicarse con {BUSINESS_NAME}. ¡Que tenga un buen día!")
}

/// A backend call failed; the caller may simply repeat.
pub fn apology() -> String {
    "Disculpe, tuve un problema técnico al consultar nuestro sistema. ¿Podría repetirme su última respuesta, por favor?"
        .to_string()
}

pub fn case_filing_failed() -> String {
    "Disculpe, tuve un problema al registrar su solicitud. Si me confirma, lo intento de nuevo."
        .to_string()
}

/// The turn could not be processed at all.
pub fn try_again_later() -> String {
    "Lo sentimos, en este momento no podemos atenderle. Por favor, intente de nuevo más tarde."
        .to_string()
}
